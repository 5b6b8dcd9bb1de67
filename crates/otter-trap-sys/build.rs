use std::env;
use std::fs;
use std::path::PathBuf;

/// Native entry points, as `(name, parameters, return type)`.
///
/// Each one is exported from `helpers.c` with the versioned suffix appended,
/// so several copies of this crate can be linked into one process.
const VERSIONED_FUNCTIONS: &[(&str, &str, &str)] = &[
    (
        "otter_trap_setjmp",
        "slot: *mut *const u8, operation: GuardedOperation, payload: *mut u8, callee: *mut u8",
        "bool",
    ),
    (
        "otter_trap_guarded_call",
        "slot: *mut *const u8, operation: GuardedOperation, payload: *mut u8, callee: *mut u8",
        "c_int",
    ),
    ("otter_trap_longjmp", "jmp_buf: *const u8", "!"),
    ("otter_trap_strategy", "", "c_int"),
    ("otter_trap_jmp_buf_size", "", "usize"),
    ("otter_trap_jit_debug_descriptor", "", "*mut JitDescriptor"),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/helpers.c");

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    let target_env = env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();
    let is_windows = env::var("CARGO_CFG_WINDOWS").is_ok();

    // helpers.c is written against either the POSIX or the MSVCRT/MinGW
    // setjmp family; anything else has no jump primitive to select from.
    if env::var("CARGO_CFG_UNIX").is_err() && !is_windows {
        panic!("Unsupported OS for otter-trap helpers: {}", target_os);
    }

    let suffix = versioned_suffix();
    println!("cargo:rustc-env=OTTER_TRAP_VERSIONED_SUFFIX={}", suffix);

    build_helpers(&target_os, &target_arch, &target_env, &suffix);
    write_bindings(&suffix, is_windows);
}

fn versioned_suffix() -> String {
    format!(
        "_v{}_{}_{}",
        env::var("CARGO_PKG_VERSION_MAJOR").unwrap(),
        env::var("CARGO_PKG_VERSION_MINOR").unwrap(),
        env::var("CARGO_PKG_VERSION_PATCH").unwrap(),
    )
}

fn build_helpers(target_os: &str, target_arch: &str, target_env: &str, suffix: &str) {
    let mut build = cc::Build::new();
    build.warnings(true);
    build.define(&format!("CFG_TARGET_OS_{}", target_os), None);
    build.define(&format!("CFG_TARGET_ARCH_{}", target_arch), None);
    if !target_env.is_empty() {
        build.define(&format!("CFG_TARGET_ENV_{}", target_env), None);
    }
    build.define("VERSIONED_SUFFIX", Some(suffix));
    build.file("src/helpers.c");
    build.compile("otter-trap-helpers");
}

fn write_bindings(suffix: &str, is_windows: bool) {
    let mut out = String::from("unsafe extern \"C\" {\n");
    let mut functions: Vec<(&str, &str, &str)> = VERSIONED_FUNCTIONS.to_vec();
    if !is_windows {
        functions.push(("otter_trap_using_libunwind", "", "bool"));
    }

    for (name, params, ret) in functions {
        out.push_str(&format!("    #[link_name = \"{}{}\"]\n", name, suffix));
        out.push_str(&format!("    pub fn {}({}) -> {};\n", name, params, ret));
    }
    out.push_str("}\n");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("bindings.rs"), out).expect("Failed to write otter-trap bindings");
}
