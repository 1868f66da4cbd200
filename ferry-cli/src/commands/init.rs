//! Init command handler
//!
//! Scaffolds a sample `ferry.toml` to start a release pipeline from.

use anyhow::{Context, Result, bail};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_NAME: &str = "ferry.toml";

const TEMPLATE: &str = r#"# Ferry release pipeline
#
# Placeholders available in args, env, output and companions:
#   {target} {version} {task} {stage}    ({{ and }} for literal braces)

name = "my-release"
workspace = "."

[[stages]]
name = "build"

[[stages.tasks]]
name = "linux"
target = "x86_64-unknown-linux-gnu"
program = "cargo"
args = ["build", "--release", "--target", "{target}"]
output = "target/{target}/release/my-app"
resources = { cpus = 2 }

[[stages.tasks]]
name = "windows"
target = "x86_64-pc-windows-gnu"
program = "cargo"
args = ["build", "--release", "--target", "{target}"]
output = "target/{target}/release/my-app.exe"
resources = { cpus = 2 }

[[stages]]
name = "deploy"
depends_on = ["build"]
environment = "production"
approval = { message = "Deploy {version} to production?" }

[[stages.tasks]]
name = "deploy-production"
target = "production"
program = "./scripts/deploy.sh"
args = ["{version}"]
secrets = ["DEPLOY_TOKEN"]
timeout_secs = 600
"#;

/// Write the sample definition into `output_dir`
pub fn handle_init_command(output_dir: &str, force: bool) -> Result<()> {
    let path = write_template(Path::new(output_dir), force)?;

    println!("{}", "✓ Pipeline definition created!".green().bold());
    println!("  {}", path.display().to_string().cyan());
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Edit the stages and tasks for your project");
    println!(
        "  2. Check it with {}",
        format!("ferry pipeline plan {}", path.display()).cyan()
    );
    println!(
        "  3. Release with {}",
        format!("ferry pipeline launch {} --version v0.1.0", path.display()).cyan()
    );

    Ok(())
}

fn write_template(output_dir: &Path, force: bool) -> Result<PathBuf> {
    let path = output_dir.join(FILE_NAME);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;
    fs::write(&path, TEMPLATE).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::definition::PipelineDefinition;

    #[test]
    fn test_template_is_a_valid_definition() {
        let definition = PipelineDefinition::from_toml_str(TEMPLATE).unwrap();
        assert_eq!(definition.plan().unwrap(), vec!["build", "deploy"]);
        assert!(definition.stage("deploy").unwrap().requires_approval());
    }

    #[test]
    fn test_write_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_template(dir.path(), false).unwrap();
        assert!(path.is_file());

        fs::write(&path, "custom").unwrap();
        assert!(write_template(dir.path(), false).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "custom");

        write_template(dir.path(), true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), TEMPLATE);
    }

    #[test]
    fn test_write_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("release/pipelines");

        let path = write_template(&nested, false).unwrap();
        assert_eq!(path, nested.join(FILE_NAME));
    }
}
