//! Text rendering of wizard pages, requirement tables and plans.

use std::fmt::Write;

use wizard_core::ast::SelectionMode;
use wizard_core::page::Page;
use wizard_core::plan::InstallationPlan;
use wizard_core::requirements::RequirementResult;

fn mode_hint(mode: SelectionMode) -> &'static str {
    match mode {
        SelectionMode::ExactlyOne => "select exactly one",
        SelectionMode::AtLeastOne => "select one or more",
        SelectionMode::Any => "select any number, or none",
    }
}

/// Renders a page the way the installer dialog lays it out.
pub fn page_view(page: &Page, number: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Page {} ({})", number, mode_hint(page.mode));
    let _ = writeln!(out, "Description:");
    for line in page.description.lines() {
        let _ = writeln!(out, "  {}", line);
    }
    let _ = writeln!(out, "Options:");
    let previous = page.previous_selection.as_deref().unwrap_or_default();
    for (i, option) in page.options.iter().enumerate() {
        let mut marker = String::new();
        if option.is_default {
            marker.push_str(" (default)");
        }
        if previous.contains(&i) {
            marker.push_str(" (selected before)");
        }
        let _ = writeln!(out, "  [{}] {}{}", i, option.label, marker);
        if !option.description.is_empty() {
            let _ = writeln!(out, "      {}", option.description);
        }
        if let Some(image) = &option.image {
            let _ = writeln!(out, "      Image: {}", image);
        }
    }
    out
}

/// Renders requirement results as a Need / Have table.
pub fn requires_view(results: &[RequirementResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<20}{:<14}{:<14}{}", "Component", "Need", "Have", "Status");
    for r in results {
        let _ = writeln!(
            out,
            "{:<20}{:<14}{:<14}{}",
            r.component.to_string(),
            r.need,
            r.have_display(),
            if r.passed { "ok" } else { "MISSING" }
        );
    }
    out
}

/// Renders the completed plan.
pub fn complete_view(plan: &InstallationPlan) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Sub-Packages:");
    if plan.subpackages().is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for name in plan.subpackages() {
        let _ = writeln!(out, "  {}", name);
    }

    let _ = writeln!(out, "Plugins:");
    if plan.plugins().is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for plugin in plan.plugins() {
        let check = if plugin.enabled { "x" } else { " " };
        let _ = writeln!(out, "  [{}] {}", check, plugin.name);
    }

    if !plan.renames().is_empty() {
        let _ = writeln!(out, "Renames:");
        for rename in plan.renames() {
            let _ = writeln!(out, "  {} -> {}", rename.from, rename.to);
        }
    }

    if !plan.ini_tweaks().is_empty() {
        let _ = writeln!(out, "INI Tweaks:");
        for tweak in plan.ini_tweaks() {
            let _ = writeln!(
                out,
                "  {} [{}] {} = {}",
                tweak.file, tweak.section, tweak.key, tweak.value
            );
        }
    }

    if !plan.notes().is_empty() {
        let _ = writeln!(out, "Notes:");
        for note in plan.notes() {
            let _ = writeln!(out, "  - {}", note);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wizard_core::host::Component;
    use wizard_core::page::PageOption;
    use wizard_core::plan::{IniTweak, PlanBuilder};

    #[test]
    fn test_page_view_lists_options() {
        let page = Page {
            description: "Pick a size".into(),
            options: vec![
                PageOption {
                    label: "2K".into(),
                    description: "Smaller".into(),
                    image: Some("img\\2k.jpg".into()),
                    is_default: true,
                },
                PageOption {
                    label: "4K".into(),
                    description: String::new(),
                    image: None,
                    is_default: false,
                },
            ],
            mode: SelectionMode::ExactlyOne,
            allows_empty: false,
            line: 3,
            previous_selection: None,
        };
        let view = page_view(&page, 1);
        assert!(view.starts_with("Page 1 (select exactly one)"));
        assert!(view.contains("Description:\n  Pick a size"));
        assert!(view.contains("  [0] 2K (default)\n      Smaller\n      Image: img\\2k.jpg"));
        assert!(view.contains("  [1] 4K\n"));

        let revisited = Page {
            previous_selection: Some(vec![1]),
            ..page
        };
        let view = page_view(&revisited, 1);
        assert!(view.contains("  [0] 2K (default)\n"));
        assert!(view.contains("  [1] 4K (selected before)\n"));
    }

    #[test]
    fn test_requires_view_shows_na() {
        let results = vec![RequirementResult {
            component: Component::ScriptExtender,
            need: "0.2.0.12".into(),
            have: None,
            passed: false,
        }];
        let view = requires_view(&results);
        assert!(view.contains("Need"));
        assert!(view.contains("Have"));
        assert!(view.contains("Script Extender"));
        assert!(view.contains("N/A"));
        assert!(view.contains("MISSING"));
    }

    #[test]
    fn test_complete_view_sections() {
        let mut b = PlanBuilder::new();
        b.select_subpackage("00 Core");
        b.select_plugin("Main.esp");
        b.deselect_plugin("Old.esp");
        b.edit_ini(IniTweak {
            file: "Skyrim.ini".into(),
            section: "General".into(),
            key: "sLanguage".into(),
            value: "ENGLISH".into(),
        });
        b.note("Thanks");
        let view = complete_view(&b.finalize());
        assert!(view.contains("Sub-Packages:\n  00 Core\n"));
        assert!(view.contains("Plugins:\n  [x] Main.esp\n  [ ] Old.esp\n"));
        assert!(view.contains("INI Tweaks:\n  Skyrim.ini [General] sLanguage = ENGLISH\n"));
        assert!(view.contains("Notes:\n  - Thanks\n"));
        assert!(!view.contains("Renames:"));
    }

    #[test]
    fn test_complete_view_empty_plan() {
        let view = complete_view(&PlanBuilder::new().finalize());
        assert_eq!(view, "Sub-Packages:\n  (none)\nPlugins:\n  (none)\n");
    }
}
