//! `nextai-gateway doctor` — diagnostic checks against the resolved config.

use sa_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary. `Ok(true)` when every
/// check passes, `Ok(false)` when at least one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("nextai-gateway doctor");
    println!("=====================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_llm_providers(config, &mut all_passed);
    check_workspace(config, &mut all_passed);
    check_data_dir(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists { config_path.to_owned() } else { format!("{config_path} not found (using defaults)") },
    );
    // Missing config is not an error — built-in defaults are valid.
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check("Config validation", error_count == 0, format!("{} issue(s) ({error_count} error(s))", issues.len()));
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_llm_providers(config: &Config, all_passed: &mut bool) {
    let count = config.llm.providers.len();
    print_check(
        "LLM providers configured",
        true,
        if count > 0 { format!("{count} provider(s)") } else { "none configured (demo adapter only)".into() },
    );
    let _ = all_passed;
}

fn check_workspace(config: &Config, all_passed: &mut bool) {
    let path = &config.workspace.root;
    let exists = path.exists();
    print_check("Workspace root", exists, if exists { path.display().to_string() } else { format!("{} (does not exist)", path.display()) });
    if !exists {
        *all_passed = false;
    }
}

fn check_data_dir(config: &Config, all_passed: &mut bool) {
    let path = &config.workspace.data_dir;
    let writable = std::fs::create_dir_all(path).is_ok();
    print_check("Data directory writable", writable, path.display().to_string());
    if !writable {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
