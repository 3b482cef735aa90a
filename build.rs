fn main() {
    // Tauri build will embed Windows resources (icons) if RC.EXE is available.
    // The library alone needs no build step.
    #[cfg(feature = "desktop")]
    tauri_build::build()
}
