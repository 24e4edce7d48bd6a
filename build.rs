use std::env;
use std::path::Path;

/// Try to link to an existing `libibumad` installation.
///
/// `libibumad` is registered to `pkg-config` by both rdma-core and
/// MLNX_OFED v5.x. For MLNX_OFED v4.x, set `UMAD_INCLUDE_DIR` and
/// `UMAD_LIB_DIR` manually.
fn link_umad() -> Result<Vec<String>, ()> {
    if let Ok(lib_dir) = env::var("UMAD_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", lib_dir);
        println!("cargo:rustc-link-lib=ibumad");
        let include_dirs = match env::var("UMAD_INCLUDE_DIR") {
            Ok(include_dir) => vec![include_dir],
            Err(_) => Vec::new(),
        };
        return Ok(include_dirs);
    }

    let lib = pkg_config::Config::new()
        .statik(false)
        .probe("libibumad")
        .map_err(|_| ())?;
    Ok(lib
        .include_paths
        .iter()
        .filter_map(|p| p.to_str().map(|s| s.to_owned()))
        .collect())
}

/// Build flow:
///
/// 1. Without the `umad` feature, there is nothing to link.
/// 2. Otherwise, link to `libibumad` and generate bindings for it.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    if env::var_os("CARGO_FEATURE_UMAD").is_none() {
        return;
    }

    println!("cargo:rerun-if-changed=src/bindings/umad.h");
    println!("cargo:rerun-if-env-changed=UMAD_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=UMAD_LIB_DIR");

    let include_dirs = link_umad().expect("cannot find libibumad, is rdma-core installed?");
    gen_umad_bindings(include_dirs);
}

fn gen_umad_bindings(include_dirs: Vec<String>) {
    let include_args = include_dirs.iter().map(|p| format!("-I{}", p));
    let bindings = bindgen::builder()
        .clang_args(include_args)
        .header("src/bindings/umad.h")
        .allowlist_function("umad_.*")
        .allowlist_type("umad_.*")
        .allowlist_type("ib_mad_addr")
        .allowlist_type("ib_user_mad")
        .opaque_type("pthread_.*")
        .derive_copy(true)
        .derive_debug(false)
        .derive_default(true)
        .generate_comments(true)
        .layout_tests(false)
        .prepend_enum_name(false)
        .size_t_is_usize(true)
        .generate()
        .expect("failed to generate bindings");

    let out_dir = env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest = Path::new(&out_dir).join("umad_bindings.rs");
    bindings
        .write_to_file(dest)
        .expect("failed to write bindings");
}
