fn main() {
    let (hash, date) = std::process::Command::new("git")
        .args(["log", "-1", "--format=%h %cd", "--date=short"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .and_then(|s| {
            let s = s.trim().to_string();
            let (h, d) = s.split_once(' ')?;
            Some((h.to_string(), d.to_string()))
        })
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

    let dirty = std::process::Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .map(|o| o.status.success() && !o.stdout.trim_ascii().is_empty())
        .unwrap_or(false);

    let hash = if dirty { format!("{hash}-dirty") } else { hash };

    println!("cargo:rustc-env=ORA2PG_ADMIN_GIT_HASH={hash}");
    println!("cargo:rustc-env=ORA2PG_ADMIN_BUILD_DATE={date}");
}
