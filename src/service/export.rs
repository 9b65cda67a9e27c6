//! 账单列表 CSV 导出

use std::io::Write;

use super::pricing;
use super::status::resolve;
use crate::models::Bill;

const HEADER: [&str; 7] = [
    "serial_number",
    "doctor_name",
    "patient_name",
    "work_description",
    "bill_date",
    "amount",
    "status",
];

/// 写出账单，返回写出的行数（不含表头）
pub fn bills_to_csv<W: Write>(bills: &[&Bill], writer: W) -> Result<usize, csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(HEADER)?;

    for bill in bills {
        let status = resolve(bill);
        let amount = bill
            .amount
            .as_ref()
            .map(pricing::format_amount)
            .unwrap_or_default();
        writer.write_record([
            bill.serial_number.as_str(),
            bill.doctor_name.as_str(),
            bill.patient_name.as_str(),
            bill.work_description.as_str(),
            bill.bill_date.as_str(),
            amount.as_str(),
            status.status.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(bills.len())
}
