#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// A small orders file whose headers exercise every canonical field rule
/// except an explicit revenue column, so revenue is derived from
/// price × quantity.
pub const ORDERS_CSV: &str = "\
order_id,product_name,created_at,qty,unit_price,sales_channel,city,state,zip
1001,widget,2024-01-01,2,5.00,web,Seattle,WA,98101
1002,gadget,2024-01-01,1,20.00,retail,Portland,OR,97201
1003,widget,2024-01-02,3,5.00,web,Seattle,WA,98101
1004,widget,2024-02-03,1,5.00,web,Tacoma,WA,98401
";

/// Four flat days and one spike; the spike day scores |z| = 2 exactly.
pub const SPIKE_CSV: &str = "\
product,revenue,created_at
widget,100,2024-01-01
widget,100,2024-01-02
widget,100,2024-01-03
widget,100,2024-01-04
widget,1000,2024-01-05
";
