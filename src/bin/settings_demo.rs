use tokengate::settings::*;

// $ cargo run --bin settings_demo -- --settings=settings/release.toml
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = parse_settings(cli.settings.as_deref())?;

    println!("storage backend: {}", settings.storage.backend);
    println!(
        "access ttl {}s, refresh ttl {}s, remember-me ttl {}s",
        settings.auth.access_ttl_secs,
        settings.auth.refresh_ttl_secs,
        settings.auth.remember_me_ttl_secs
    );
    println!(
        "grace {}s, reuse epoch {}s, password epoch {}s",
        settings.auth.rotation_grace_secs,
        settings.auth.reuse_epoch_secs,
        settings.auth.password_change_epoch_secs
    );

    let missing = parse_settings(Some("settings/does-not-exist")).is_err();
    println!("missing file rejected: {missing}");
    Ok(())
}
