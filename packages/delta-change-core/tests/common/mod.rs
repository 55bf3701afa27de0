//! Builds Delta tables on disk: JSON commit files plus real Parquet data files.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

pub const BASE_TS: i64 = 1_704_067_200_000; // 2024-01-01 00:00:00 UTC

/// One row of the fixture schema `(id: Int64, status: Utf8 nullable)`.
pub type Row<'a> = (i64, Option<&'a str>);

pub struct TableFixture {
    dir: TempDir,
    next_version: u64,
    live: Vec<String>,
}

impl TableFixture {
    pub fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            next_version: 0,
            live: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_path(&self, version: u64) -> PathBuf {
        self.root()
            .join("_delta_log")
            .join(format!("{:020}.json", version))
    }

    /// Commits a version replacing every live file with one holding `rows`.
    pub fn overwrite(&mut self, rows: &[Row]) -> u64 {
        let file = self.data_file_name();
        self.write_parquet(&file, rows);
        let removes = std::mem::take(&mut self.live);
        self.commit("WRITE", "Overwrite", &removes, &[file])
    }

    /// Commits a version adding one file holding `rows`.
    pub fn append(&mut self, rows: &[Row]) -> u64 {
        let file = self.data_file_name();
        self.write_parquet(&file, rows);
        self.commit("WRITE", "Append", &[], &[file])
    }

    /// Commits a version adding a Parquet file under `relative`, referenced in
    /// the log by `log_entry_path`.
    pub fn append_at(&mut self, relative: &str, log_entry_path: &str, rows: &[Row]) -> u64 {
        self.write_parquet(relative, rows);
        self.commit("WRITE", "Append", &[], &[log_entry_path.to_string()])
    }

    /// Commits a version adding a Parquet file whose schema is `(id, other)`.
    pub fn append_without_status(&mut self, ids: &[i64]) -> u64 {
        let file = self.data_file_name();
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("other", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids.to_vec())) as ArrayRef,
                Arc::new(Int64Array::from(ids.to_vec())) as ArrayRef,
            ],
        )
        .unwrap();
        write_batch(&self.root().join(&file), &batch);
        self.commit("WRITE", "Append", &[], &[file])
    }

    /// Writes `contents` verbatim as the next commit file.
    pub fn raw_commit(&mut self, contents: &str) -> u64 {
        let version = self.next_version;
        let path = self.log_path(version);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self.next_version += 1;
        version
    }

    fn data_file_name(&self) -> String {
        format!("part-{:05}-c000.snappy.parquet", self.next_version)
    }

    fn write_parquet(&self, relative: &str, rows: &[Row]) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        write_batch(&path, &status_batch(rows));
    }

    fn commit(&mut self, operation: &str, mode: &str, removes: &[String], adds: &[String]) -> u64 {
        let version = self.next_version;
        let mut lines: Vec<Value> = Vec::new();
        if version == 0 {
            lines.push(json!({"protocol": {"minReaderVersion": 1, "minWriterVersion": 2}}));
            lines.push(json!({"metaData": {"id": "fixture", "partitionColumns": []}}));
        }
        lines.push(json!({
            "commitInfo": {
                "timestamp": BASE_TS + version as i64 * 60_000,
                "operation": operation,
                "operationParameters": {"mode": mode, "partitionBy": "[]"}
            }
        }));
        for path in removes {
            lines.push(json!({"remove": {"path": path, "dataChange": true}}));
        }
        for path in adds {
            lines.push(json!({"add": {"path": path, "dataChange": true, "size": 0}}));
        }

        let contents: Vec<String> = lines.iter().map(Value::to_string).collect();
        self.raw_commit(&contents.join("\n"));
        self.live.retain(|path| !removes.contains(path));
        self.live.extend(adds.iter().cloned());
        version
    }
}

fn status_batch(rows: &[Row]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("status", DataType::Utf8, true),
    ]));
    let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
    let statuses: Vec<Option<&str>> = rows.iter().map(|(_, status)| *status).collect();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ids)) as ArrayRef,
            Arc::new(StringArray::from(statuses)) as ArrayRef,
        ],
    )
    .unwrap()
}

fn write_batch(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}
