//! Parquet implementation of [`ColumnReader`].

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use serde_json::{Number, Value};

use crate::error::ScanError;

use super::ColumnReader;

/// Reads columns from Parquet files through the arrow record batch reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetColumnReader;

impl ParquetColumnReader {
    pub fn new() -> Self {
        Self
    }
}

impl ColumnReader for ParquetColumnReader {
    fn read_columns(&self, path: &Path, columns: &[&str]) -> Result<Vec<Vec<Value>>, ScanError> {
        let display = path.display().to_string();
        let file_error = |reason: String| ScanError::FileRead {
            path: display.clone(),
            reason,
        };

        let file = File::open(path).map_err(|e| file_error(format!("Cannot open file: {}", e)))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| file_error(format!("Parquet reader error: {}", e)))?;

        let schema = builder.schema().clone();
        if let Some(column) = columns.iter().find(|c| schema.field_with_name(c).is_err()) {
            return Err(ScanError::ColumnNotFound {
                path: display.clone(),
                column: column.to_string(),
            });
        }

        // Only decode the requested leaf columns
        let mask = ProjectionMask::columns(builder.parquet_schema(), columns.iter().copied());
        let reader = builder
            .with_projection(mask)
            .build()
            .map_err(|e| file_error(format!("Parquet reader build error: {}", e)))?;

        let mut values: Vec<Vec<Value>> = vec![Vec::new(); columns.len()];
        for batch_result in reader {
            let batch =
                batch_result.map_err(|e| file_error(format!("Parquet read error: {}", e)))?;

            for (column, out) in columns.iter().zip(values.iter_mut()) {
                let array = batch
                    .column_by_name(column)
                    .ok_or_else(|| ScanError::ColumnNotFound {
                        path: display.clone(),
                        column: column.to_string(),
                    })?;
                out.reserve(array.len());
                for row in 0..array.len() {
                    out.push(arrow_value_to_json(array, row));
                }
            }
        }

        Ok(values)
    }
}

/// Converts one arrow cell to a JSON value.
///
/// Booleans, integers, floats and strings keep their type; any other arrow
/// type is rendered with arrow's display formatting.
pub fn arrow_value_to_json(array: &ArrayRef, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match array.data_type() {
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Int8 => Value::from(array.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => Value::from(array.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => Value::from(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::from(array.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => Value::from(array.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => Value::from(array.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => Value::from(array.as_primitive::<UInt64Type>().value(row)),
        DataType::Float32 => float_value(array.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => float_value(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        _ => array_value_to_string(array, row)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

// NaN and infinities have no JSON form
fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}
