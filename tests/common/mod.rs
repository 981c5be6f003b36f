#![allow(dead_code)]

use std::{
    path::Path,
    process::{Command, Output},
};

/// Set in the environment of a re-executed test binary.
const CHILD_ENV: &str = "FORWARD_PROXY_TEST_CHILD";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Whether this process is a child started by [`run_child`].
pub fn is_child() -> bool {
    std::env::var_os(CHILD_ENV).is_some()
}

/// Re-runs the current test binary with only the ignored test `name`.
///
/// Used for behaviour that terminates the process.
pub fn run_child(name: &str) -> Output {
    let exe = std::env::current_exe().unwrap();
    Command::new(exe)
        .args([name, "--exact", "--ignored", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .output()
        .unwrap()
}

/// Names of every symbol the shared library at `path` exports.
///
/// ELF libraries are read from the dynamic symbol table so that
/// `STT_GNU_IFUNC` exports (most of glibc's `libm`) are counted too;
/// `is_definition` is false for those, so only undefined entries are dropped.
pub fn exported_names(path: &Path) -> Vec<String> {
    use object::{Object, ObjectSymbol};

    let data = std::fs::read(path).unwrap();
    let file = object::File::parse(&*data).unwrap();
    if file.format() == object::BinaryFormat::Elf {
        return file
            .dynamic_symbols()
            .filter(|sym| !sym.is_undefined() && sym.is_global())
            .filter_map(|sym| sym.name().ok().map(str::to_owned))
            .collect();
    }
    file.exports()
        .unwrap()
        .iter()
        .map(|export| String::from_utf8_lossy(export.name()).into_owned())
        .collect()
}
