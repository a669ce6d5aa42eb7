use crate::diff::{Changeset, FunctionChange};
use crate::output::is_quiet;
use crate::ui::{theme, Icons};
use owo_colors::{OwoColorize, Style};

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn section(title: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn timing(elapsed: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), elapsed);
}

fn function_line(icon: &str, style: &Style, change: &FunctionChange) {
    println!(
        "    {} {} {}",
        icon,
        change.signature.as_str().style(style.clone()),
        muted(&format!("{}-{}", change.begin_line, change.end_line))
    );
}

/// Print a change set grouped by file
pub fn changeset(changes: &Changeset) {
    if is_quiet() {
        return;
    }
    if changes.is_empty() {
        println!("  {}", muted("no function-level changes"));
        return;
    }
    let theme = theme();
    for (path, file) in changes.iter() {
        println!("{} {}", Icons::FILE.style(theme.info.clone()), path);
        for change in &file.added {
            function_line(Icons::NEW, &theme.added, change);
        }
        for change in &file.removed {
            function_line(Icons::DEL, &theme.removed, change);
        }
        for change in &file.modified {
            function_line(Icons::MOD, &theme.modified, change);
        }
    }
}
