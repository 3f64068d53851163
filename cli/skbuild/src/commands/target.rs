//! `skbuild target`: platform listing and description.

use anyhow::Result;
use skbuild_targets::{builtin_targets, gn_args, PlatformId, TextBackend, Variant};

/// List all supported platforms.
pub fn list() -> Result<()> {
    println!("Supported platforms:");
    println!();
    for (name, description) in builtin_targets() {
        println!("  {name:<12} {description}");
    }
    println!("  {:<12} macOS universal + iOS, bundled as Skia.xcframework", "xcframework");
    println!();
    println!("Use 'skbuild target describe <name>' for details.");
    Ok(())
}

/// Describe one platform.
pub fn describe(name: &str) -> Result<()> {
    print!("{}", describe_text(name.parse()?));
    Ok(())
}

fn names<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn describe_text(platform: PlatformId) -> String {
    let target = platform.target();
    let platform_args = gn_args::platform_args(platform, Variant::Gpu);
    let mut out = String::new();
    out.push_str(&format!("=== Platform: {platform} ===\n"));
    out.push_str(&format!("{}\n\n", target.description));

    out.push_str("--- Architectures ---\n");
    out.push_str(&format!("  Allowed: {}\n", names(target.allowed_archs)));
    out.push_str(&format!("  Default: {}\n", names(target.default_archs)));
    if let Some(min) = target.min_os_version {
        out.push_str(&format!("  Minimum OS: {min}\n"));
    }
    out.push('\n');

    out.push_str("--- Libraries ---\n");
    for lib in target
        .libraries(TextBackend::Icu)
        .into_iter()
        .chain(target.gpu_libraries(Variant::Gpu))
    {
        out.push_str(&format!("  {lib}\n"));
    }
    out.push('\n');

    out.push_str("--- Platform GN arguments (gpu) ---\n");
    for line in platform_args.render().lines() {
        out.push_str(&format!("  {line}\n"));
    }
    out
}
