// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(all(not(debug_assertions), feature = "shell"), windows_subsystem = "windows")]

fn main() {
    demowebrtc_lib::run()
}
