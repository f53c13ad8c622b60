use owo_colors::OwoColorize;
use version_check_widget::{BannerIcon, BannerStatus, WarningBanner};

fn glyph(icon: BannerIcon) -> &'static str {
    match icon {
        BannerIcon::Shield => "⛨",
        BannerIcon::Critical => "⊗",
        BannerIcon::Caution => "⚠",
    }
}

pub fn banner(banner: &WarningBanner, current_version: Option<&str>, color: bool) -> String {
    let heading = format!("{} {}", glyph(banner.icon), banner.title);
    let heading = match (color, banner.status) {
        (false, _) => heading,
        (true, BannerStatus::Error) => heading.red().bold().to_string(),
        (true, BannerStatus::Warning) => heading.yellow().bold().to_string(),
    };

    let mut lines = vec![heading, format!("  {}", banner.message)];
    if let Some(remaining) = &banner.remaining {
        lines.push(format!("  {remaining}"));
    }
    if let Some(version) = current_version {
        lines.push(format!("  Current version: {version}"));
    }
    if let Some(dismiss) = &banner.dismiss {
        let control = if dismiss.enabled {
            format!("  [d] {} ({})", dismiss.label, dismiss.hint)
        } else {
            format!("  [d] {} (in progress)", dismiss.label)
        };
        lines.push(if color {
            control.dimmed().to_string()
        } else {
            control
        });
    }
    lines.join("\n")
}

pub fn notice(message: &str, color: bool) -> String {
    let text = format!("There was a problem submitting this request: {message}");
    if color { text.red().to_string() } else { text }
}
