//! 报表导出为 Excel (.xlsx)

use hospital_core::{HospitalError, Result};
use hospital_database::{DoctorPerformanceRow, OccupancyRow, RevenueRow, TopMedicineRow};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// 导出的全部报表数据
#[derive(Debug, Clone, Default)]
pub struct ReportBundle {
    pub revenue: Vec<RevenueRow>,
    pub top_medicines: Vec<TopMedicineRow>,
    pub occupancy: Vec<OccupancyRow>,
    pub doctor_performance: Vec<DoctorPerformanceRow>,
}

fn money(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn write_header(sheet: &mut Worksheet, columns: &[&str], bold: &Format) -> std::result::Result<(), XlsxError> {
    for (col, title) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, bold)?;
        sheet.set_column_width(col as u16, 18)?;
    }
    Ok(())
}

fn write_workbook(bundle: &ReportBundle) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let amount = Format::new().set_num_format("#,##0");

    let sheet = workbook.add_worksheet();
    sheet.set_name("Revenue")?;
    write_header(sheet, &["Date", "Revenue", "Invoices"], &bold)?;
    for (i, row) in bundle.revenue.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, row.date.format("%Y-%m-%d").to_string())?;
        sheet.write_number_with_format(r, 1, money(row.revenue), &amount)?;
        sheet.write_number(r, 2, row.invoice_count as f64)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Top medicines")?;
    write_header(sheet, &["Medicine", "Sold", "In stock"], &bold)?;
    for (i, row) in bundle.top_medicines.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.name)?;
        sheet.write_number(r, 1, row.sold_quantity as f64)?;
        sheet.write_number(r, 2, f64::from(row.stock_quantity))?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Bed occupancy")?;
    write_header(sheet, &["Department", "Total beds", "Occupied", "Rate (%)"], &bold)?;
    for (i, row) in bundle.occupancy.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.department_name)?;
        sheet.write_number(r, 1, row.total_beds as f64)?;
        sheet.write_number(r, 2, row.occupied_beds as f64)?;
        sheet.write_number(r, 3, row.occupancy_rate)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Doctor performance")?;
    write_header(sheet, &["Doctor", "Visits", "Completed", "Revenue"], &bold)?;
    for (i, row) in bundle.doctor_performance.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.full_name)?;
        sheet.write_number(r, 1, row.total_visits as f64)?;
        sheet.write_number(r, 2, row.completed_visits as f64)?;
        sheet.write_number_with_format(r, 3, money(row.revenue), &amount)?;
    }

    workbook.save_to_buffer()
}

/// 生成包含四张工作表的工作簿
pub fn build_report_workbook(bundle: &ReportBundle) -> Result<Vec<u8>> {
    write_workbook(bundle)
        .map_err(|e| HospitalError::Internal(format!("failed to build report workbook: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn test_workbook_is_zip_archive() {
        let bundle = ReportBundle {
            revenue: vec![RevenueRow {
                date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
                revenue: Decimal::new(1_250_000, 0),
                invoice_count: 3,
            }],
            top_medicines: vec![TopMedicineRow {
                medicine_id: Uuid::new_v4(),
                name: "Paracetamol 500mg".to_string(),
                sold_quantity: 42,
                stock_quantity: 158,
            }],
            occupancy: vec![],
            doctor_performance: vec![],
        };

        let bytes = build_report_workbook(&bundle).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_empty_bundle_still_exports() {
        let bytes = build_report_workbook(&ReportBundle::default()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
