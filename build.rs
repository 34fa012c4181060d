// audioreactive-input - Build Script
//
// Sets up the ESP-IDF environment when building for the device.

fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
    println!("cargo:rerun-if-changed=build.rs");
}
