use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");

    let crate_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let out = crate_dir.join("include").join("cities.h");

    let generated = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("CITIES_FFI_H")
        .with_documentation(true)
        .generate();

    match generated {
        Ok(bindings) => {
            if let Err(err) = std::fs::create_dir_all(crate_dir.join("include")) {
                println!("cargo:warning=could not create include dir: {err}");
                return;
            }
            bindings.write_to_file(out);
        }
        Err(err) => println!("cargo:warning=cbindgen skipped: {err}"),
    }
}
