/// Shell used when none is configured.
pub fn default_shell() -> String {
    if cfg!(windows) {
        "cmd".to_string()
    } else {
        "sh".to_string()
    }
}

/// Flag that makes `shell` execute its next argument as a script.
pub fn script_flag(shell: &str) -> &'static str {
    let name = shell
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(shell)
        .to_ascii_lowercase();
    match name.as_str() {
        "cmd" | "cmd.exe" => "/C",
        "powershell" | "powershell.exe" | "pwsh" | "pwsh.exe" => "-Command",
        _ => "-c",
    }
}
