fn main() {
    println!("cargo:rerun-if-changed=components/bindings.h");

    // Host builds (unit/integration tests, simulation binary) need no
    // ESP-IDF environment; only forward it when cross-compiling.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
