//! 测试通用工具

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn setup() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();
    });
}

/// 在输出目录下的日期子目录里写入一个文件，返回其路径
#[allow(dead_code)]
pub fn write_output(root: &Path, date_dir: &str, name: &str) -> PathBuf {
    let dir = root.join(date_dir);
    fs::create_dir_all(&dir).expect("create date dir");
    let path = dir.join(name);
    fs::write(&path, b"fake image bytes").expect("write output file");
    path
}
