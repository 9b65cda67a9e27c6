//! 单据 HTML 渲染（A4 打印版式）

use crate::service::document::{Document, DocumentRow, PLACEHOLDER};
use crate::service::pricing;
use crate::service::tooth::QuadrantGrid;

/// 固定列：流水号、患者、产品、色号、牙位、日期、金额
const COLUMNS: [&str; 7] = ["Serial", "Patient", "Product", "Shade", "Teeth", "Date", "Amount"];

fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<title>{}</title>
<style>
@page {{ size: A4; margin: 12mm; }}
body {{ font-family: Arial, Helvetica, sans-serif; font-size: 11px; color: #111; margin: 0; }}
header {{ text-align: center; margin-bottom: 12px; }}
header h1 {{ margin: 0; font-size: 18px; }}
header h2 {{ margin: 4px 0; font-size: 14px; text-transform: uppercase; }}
.meta {{ display: flex; justify-content: space-between; margin-bottom: 8px; }}
table.bill {{ width: 100%; border-collapse: collapse; }}
table.bill th, table.bill td {{ border: 1px solid #444; padding: 4px; vertical-align: middle; }}
table.bill th {{ background: #eee; }}
td.amount {{ text-align: right; white-space: nowrap; }}
td.empty {{ text-align: center; color: #666; padding: 16px; }}
table.quadrants {{ border-collapse: collapse; margin: 0 auto; }}
table.quadrants td {{ border: none; min-width: 28px; height: 14px; text-align: center; font-size: 10px; padding: 1px 3px; }}
table.quadrants tr:first-child td {{ border-bottom: 1px solid #111; }}
table.quadrants td:first-child {{ border-right: 1px solid #111; }}
tfoot td {{ font-weight: bold; }}
.generated {{ color: #666; font-size: 9px; margin-top: 8px; text-align: right; }}
</style>
</head>
<body>{}</body>
</html>"#,
        esc(title),
        body
    )
}

fn quadrant_cell(grid: &QuadrantGrid) -> String {
    let mut cell = String::from("<table class=\"quadrants\">");
    for row in grid.rows() {
        cell.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            esc(row[0]),
            esc(row[1])
        ));
    }
    cell.push_str("</table>");
    cell
}

fn amount_cell(symbol: &str, row: &DocumentRow) -> String {
    row.amount
        .as_ref()
        .map(|a| pricing::format_currency(symbol, a))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn render_html(document: &Document) -> String {
    let mut body = format!(
        "<header><h1>{}</h1><h2>{}</h2></header>",
        esc(&document.lab_name),
        esc(&document.title)
    );
    body.push_str(&format!(
        "<div class=\"meta\"><span>Doctor: <strong>{}</strong></span><span>Ref: {}</span></div>",
        esc(&document.doctor_name),
        esc(&document.reference)
    ));

    body.push_str("<table class=\"bill\"><thead><tr>");
    for column in COLUMNS {
        body.push_str(&format!("<th>{}</th>", column));
    }
    body.push_str("</tr></thead><tbody>");

    if document.is_empty() {
        body.push_str(&format!(
            "<tr><td class=\"empty\" colspan=\"{}\">No records</td></tr>",
            COLUMNS.len()
        ));
    }
    for row in &document.rows {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"amount\">{}</td></tr>",
            esc(&row.serial_number),
            esc(&row.patient_name),
            esc(&row.description),
            esc(&row.shade),
            quadrant_cell(&row.quadrants),
            esc(&row.date),
            esc(&amount_cell(&document.currency_symbol, row)),
        ));
    }
    body.push_str("</tbody>");

    body.push_str(&format!(
        "<tfoot><tr><td colspan=\"{}\">Total</td><td class=\"amount\">{}</td></tr></tfoot></table>",
        COLUMNS.len() - 1,
        esc(&document.formatted_total())
    ));

    if !document.generated_at.is_empty() {
        body.push_str(&format!(
            "<div class=\"generated\">Generated at {}</div>",
            esc(&document.generated_at)
        ));
    }

    html_shell(
        &format!("{} - {}", document.title, document.reference),
        &body,
    )
}
