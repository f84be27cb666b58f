//! Arrow to record conversion
//!
//! Used by columnar formats that decode into Arrow record batches.

use crate::error::{Error, Result};
use crate::schema::{JsonType, StreamSchema};
use crate::types::Record;
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float16Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    Schema, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions as DisplayOptions};
use serde_json::{Map, Number, Value};

// ============================================================================
// Schema Conversion
// ============================================================================

/// Map an Arrow data type to its JSON type tag
///
/// Agrees with the values [`batch_to_records`] emits: types without a
/// native JSON rendering are strings.
pub fn arrow_type_to_json_type(data_type: &DataType) -> JsonType {
    match data_type {
        DataType::Null => JsonType::Null,
        DataType::Boolean => JsonType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => JsonType::Integer,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => JsonType::Number,
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _) => {
            JsonType::Array
        }
        DataType::Struct(_) | DataType::Map(_, _) => JsonType::Object,
        DataType::Dictionary(_, value) => arrow_type_to_json_type(value),
        _ => JsonType::String,
    }
}

/// Build a stream schema from an embedded Arrow schema
pub fn schema_from_arrow(schema: &Schema) -> StreamSchema {
    StreamSchema::from_fields(
        schema
            .fields()
            .iter()
            .map(|field| (field.name().clone(), arrow_type_to_json_type(field.data_type()))),
    )
}

// ============================================================================
// Value Conversion
// ============================================================================

/// Convert an Arrow RecordBatch to records, one per row
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let schema = batch.schema();
    let mut records = Vec::with_capacity(batch.num_rows());

    for row in 0..batch.num_rows() {
        let mut record = Map::new();
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            record.insert(field.name().clone(), array_value_to_json(column.as_ref(), row)?);
        }
        records.push(record);
    }

    Ok(records)
}

fn downcast_error(expected: &str) -> Error {
    Error::Other(format!("Failed to downcast to {expected}"))
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Convert a single array element to JSON
fn array_value_to_json(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => {
            let arr = array
                .as_boolean_opt()
                .ok_or_else(|| downcast_error("BooleanArray"))?;
            Value::Bool(arr.value(row))
        }
        DataType::Int8 => primitive::<Int8Type>(array, row)?.into(),
        DataType::Int16 => primitive::<Int16Type>(array, row)?.into(),
        DataType::Int32 => primitive::<Int32Type>(array, row)?.into(),
        DataType::Int64 => primitive::<Int64Type>(array, row)?.into(),
        DataType::UInt8 => primitive::<UInt8Type>(array, row)?.into(),
        DataType::UInt16 => primitive::<UInt16Type>(array, row)?.into(),
        DataType::UInt32 => primitive::<UInt32Type>(array, row)?.into(),
        DataType::UInt64 => primitive::<UInt64Type>(array, row)?.into(),
        DataType::Float16 => float_value(primitive::<Float16Type>(array, row)?.to_f64()),
        DataType::Float32 => float_value(f64::from(primitive::<Float32Type>(array, row)?)),
        DataType::Float64 => float_value(primitive::<Float64Type>(array, row)?),
        DataType::Utf8 => {
            let arr = array
                .as_string_opt::<i32>()
                .ok_or_else(|| downcast_error("StringArray"))?;
            Value::String(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => {
            let arr = array
                .as_string_opt::<i64>()
                .ok_or_else(|| downcast_error("LargeStringArray"))?;
            Value::String(arr.value(row).to_string())
        }
        DataType::List(_) => {
            let arr = array
                .as_list_opt::<i32>()
                .ok_or_else(|| downcast_error("ListArray"))?;
            list_to_json(arr.value(row).as_ref())?
        }
        DataType::LargeList(_) => {
            let arr = array
                .as_list_opt::<i64>()
                .ok_or_else(|| downcast_error("LargeListArray"))?;
            list_to_json(arr.value(row).as_ref())?
        }
        DataType::FixedSizeList(_, _) => {
            let arr = array
                .as_fixed_size_list_opt()
                .ok_or_else(|| downcast_error("FixedSizeListArray"))?;
            list_to_json(arr.value(row).as_ref())?
        }
        DataType::Map(_, _) => {
            let arr = array
                .as_map_opt()
                .ok_or_else(|| downcast_error("MapArray"))?;
            let entries = arr.value(row);
            let (keys, values) = (entries.column(0), entries.column(1));
            let mut obj = Map::new();
            for i in 0..entries.len() {
                let key = match array_value_to_json(keys.as_ref(), i)? {
                    Value::String(key) => key,
                    other => other.to_string(),
                };
                obj.insert(key, array_value_to_json(values.as_ref(), i)?);
            }
            Value::Object(obj)
        }
        DataType::Dictionary(_, _) => {
            let arr = array
                .as_any_dictionary_opt()
                .ok_or_else(|| downcast_error("DictionaryArray"))?;
            let key = dictionary_key(arr.keys(), row)?;
            array_value_to_json(arr.values().as_ref(), key)?
        }
        DataType::Struct(_) => {
            let arr = array
                .as_struct_opt()
                .ok_or_else(|| downcast_error("StructArray"))?;
            let mut obj = Map::new();
            for (field, column) in arr.fields().iter().zip(arr.columns()) {
                obj.insert(field.name().clone(), array_value_to_json(column.as_ref(), row)?);
            }
            Value::Object(obj)
        }
        // Temporal, decimal, binary and the rest use Arrow's display form
        _ => {
            let formatter = ArrayFormatter::try_new(array, &DisplayOptions::default())?;
            Value::String(formatter.value(row).to_string())
        }
    };

    Ok(value)
}

fn primitive<T: arrow::datatypes::ArrowPrimitiveType>(
    array: &dyn Array,
    row: usize,
) -> Result<T::Native> {
    let arr = array
        .as_primitive_opt::<T>()
        .ok_or_else(|| downcast_error("PrimitiveArray"))?;
    Ok(arr.value(row))
}

/// Position in the dictionary values for one row's key
fn dictionary_key(keys: &dyn Array, row: usize) -> Result<usize> {
    let key = match keys.data_type() {
        DataType::Int8 => usize::try_from(primitive::<Int8Type>(keys, row)?).ok(),
        DataType::Int16 => usize::try_from(primitive::<Int16Type>(keys, row)?).ok(),
        DataType::Int32 => usize::try_from(primitive::<Int32Type>(keys, row)?).ok(),
        DataType::Int64 => usize::try_from(primitive::<Int64Type>(keys, row)?).ok(),
        DataType::UInt8 => Some(usize::from(primitive::<UInt8Type>(keys, row)?)),
        DataType::UInt16 => Some(usize::from(primitive::<UInt16Type>(keys, row)?)),
        DataType::UInt32 => usize::try_from(primitive::<UInt32Type>(keys, row)?).ok(),
        DataType::UInt64 => usize::try_from(primitive::<UInt64Type>(keys, row)?).ok(),
        _ => None,
    };
    key.ok_or_else(|| Error::Other(format!("Invalid dictionary key at row {row}")))
}

fn list_to_json(values: &dyn Array) -> Result<Value> {
    let mut items = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        items.push(array_value_to_json(values, i)?);
    }
    Ok(Value::Array(items))
}
