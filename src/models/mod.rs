pub mod bill;
pub mod lenient;
pub mod work_order;

pub use bill::{Bill, BillItem, BillStatus};
pub use work_order::{WorkOrder, WorkOrderStatus};
