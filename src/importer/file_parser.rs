// ==========================================
// 订单履约后台 - 表格解析器
// ==========================================
// 职责: 把 Excel / CSV 读成原始单元格网格（不假设表头位置）
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 说明: 表头定位交给 header_detector，这里只做读取
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// 原始网格：按行的单元格文本（已 trim）
pub type Grid = Vec<Vec<String>>;

/// 网格读取接口
pub trait GridParser: Send + Sync {
    fn parse_grid(&self, file_path: &Path) -> ImportResult<Grid>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// 去掉网格尾部的全空行
fn trim_trailing_blank_rows(grid: &mut Grid) {
    while grid
        .last()
        .map(|row| row.iter().all(|c| c.is_empty()))
        .unwrap_or(false)
    {
        grid.pop();
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvGridParser;

impl GridParser for CsvGridParser {
    fn parse_grid(&self, file_path: &Path) -> ImportResult<Grid> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut grid = Grid::new();
        for result in reader.records() {
            let record = result?;
            grid.push(record.iter().map(|v| v.trim().to_string()).collect());
        }

        // 去掉 UTF-8 BOM
        if let Some(first) = grid.first_mut().and_then(|row| row.first_mut()) {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.trim().to_string();
            }
        }

        trim_trailing_blank_rows(&mut grid);
        if grid.is_empty() {
            return Err(ImportError::EmptySheet(file_path.display().to_string()));
        }
        Ok(grid)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelGridParser;

impl GridParser for ExcelGridParser {
    fn parse_grid(&self, file_path: &Path) -> ImportResult<Grid> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let mut grid: Grid = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect())
            .collect();

        trim_trailing_blank_rows(&mut grid);
        if grid.is_empty() {
            return Err(ImportError::EmptySheet(file_path.display().to_string()));
        }
        Ok(grid)
    }
}

// ==========================================
// 通用网格解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalGridParser;

impl GridParser for UniversalGridParser {
    fn parse_grid(&self, file_path: &Path) -> ImportResult<Grid> {
        match extension_of(file_path).as_str() {
            "csv" => CsvGridParser.parse_grid(file_path),
            "xlsx" | "xls" => ExcelGridParser.parse_grid(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
