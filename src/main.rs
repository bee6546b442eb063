use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pbx_patcher::ops::{find_native_target, MutationSession};
use pbx_patcher::pbx::PbxEditor;
use pbx_patcher::template::scaffold;
use pbx_patcher::{atomic_write, IdGenerator, ProjectGuard};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "pbx-patcher")]
#[command(about = "Automated Xcode project manifest editing", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a file to the project: file reference, group entry, build phase
    AddFile {
        /// File to add, relative to the project root
        file: PathBuf,

        /// Target whose build phases receive the file (default: first target)
        #[arg(short, long)]
        target: Option<String>,

        /// Path to project.pbxproj (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Dry run - show what would change without writing the manifest
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Remove files from the project by name or project-relative path
    RemoveFiles {
        /// File names or paths to remove
        #[arg(required = true)]
        names: Vec<String>,

        /// Path to project.pbxproj (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Dry run - show what would change without writing the manifest
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Print a ready-to-paste unit-test target scaffold for the main target
    AddTestTarget {
        /// Host target to scaffold tests for (default: first target)
        #[arg(short, long)]
        target: Option<String>,

        /// Path to project.pbxproj (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::AddFile {
            file,
            target,
            project,
            dry_run,
            diff,
        } => cmd_add_file(file, target, project, dry_run, diff),

        Commands::RemoveFiles {
            names,
            project,
            dry_run,
            diff,
        } => cmd_remove_files(names, project, dry_run, diff),

        Commands::AddTestTarget { target, project } => cmd_add_test_target(target, project),
    }
}

/// Resolve the manifest path: explicit flag first, otherwise the unique
/// `*.xcodeproj/project.pbxproj` under the current directory.
fn resolve_manifest(cli_project: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_project {
        if !path.exists() {
            bail!("manifest not found: {}", path.display());
        }
        return Ok(path);
    }

    let cwd = env::current_dir()?;
    let mut candidates = Vec::new();
    for entry in WalkDir::new(&cwd).max_depth(3) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.file_name() == "project.pbxproj"
            && entry
                .path()
                .parent()
                .and_then(|p| p.extension())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("xcodeproj"))
        {
            candidates.push(entry.path().to_path_buf());
        }
    }

    match candidates.len() {
        0 => bail!(
            "no *.xcodeproj/project.pbxproj found under {}; pass one with --project",
            cwd.display()
        ),
        1 => {
            let found = candidates.remove(0);
            println!(
                "{}",
                format!("Auto-detected manifest: {}", found.display()).dimmed()
            );
            Ok(found)
        }
        n => bail!(
            "{n} project manifests found under {}; pick one with --project",
            cwd.display()
        ),
    }
}

/// Show unified diff between original and modified manifest text.
fn display_diff(path: &std::path::Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", path.display()).dimmed()
    );
    println!("{}", format!("+++ {} (edited)", path.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
    }
    println!();
}

fn persist(
    manifest: &std::path::Path,
    session: &MutationSession,
    original: &str,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    if show_diff && session.changed() {
        display_diff(manifest, original, session.content());
    }

    if !session.changed() {
        println!("{}", "Manifest unchanged; nothing to write".dimmed());
        return Ok(());
    }

    if dry_run {
        println!("{}", "[DRY RUN - manifest not written]".cyan());
        return Ok(());
    }

    atomic_write(manifest, session.content())
        .with_context(|| format!("failed to write {}", manifest.display()))?;
    println!("{} Wrote {}", "✓".green(), manifest.display());
    Ok(())
}

fn cmd_add_file(
    file: PathBuf,
    target: Option<String>,
    project: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let manifest = resolve_manifest(project)?;

    let guard = ProjectGuard::for_manifest(&manifest)?;
    let rel_path = guard
        .validate_file(&file)
        .with_context(|| format!("cannot add {}", file.display()))?;

    let mut session = MutationSession::from_path(&manifest)?;
    let original = session.content().to_string();

    let report = session.add_file(&rel_path, target.as_deref())?;

    for warning in &report.warnings {
        eprintln!("{} {warning}", "⊙".yellow());
    }

    println!(
        "{} {}: file reference {}",
        "✓".green(),
        report.file_name,
        report.file_ref
    );
    if let (Some(build_file), Some(phase)) = (&report.build_file, report.phase) {
        println!(
            "{} {}: build file {} in {}",
            "✓".green(),
            report.file_name,
            build_file,
            phase.label()
        );
    }

    persist(&manifest, &session, &original, dry_run, show_diff)
}

fn cmd_remove_files(
    names: Vec<String>,
    project: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let manifest = resolve_manifest(project)?;
    let mut session = MutationSession::from_path(&manifest)?;
    let original = session.content().to_string();

    let mut total_removed = 0;
    for name in &names {
        let report = session.remove_file(name)?;
        if report.matched() {
            println!(
                "{} {}: removed {} reference(s)",
                "✓".green(),
                name,
                report.removed.len()
            );
            total_removed += report.removed.len();
        } else {
            eprintln!("{} {}: no references found", "⊙".yellow(), name);
            if !report.suggestions.is_empty() {
                eprintln!("  did you mean: {}", report.suggestions.join(", ").dimmed());
            }
        }
    }

    // Separator repair rewrites list punctuation file-wide, so a batch that
    // matched nothing skips it and leaves the manifest byte-identical.
    if total_removed > 0 {
        session.normalize()?;
    }

    // Deleting one file must never orphan another's references.
    let dangling = session.document().dangling_ids();
    if !dangling.is_empty() {
        eprintln!(
            "{} manifest has {} unresolved reference(s) after removal",
            "⊙".yellow(),
            dangling.len()
        );
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} reference(s) removed", format!("{total_removed}").green());

    persist(&manifest, &session, &original, dry_run, show_diff)
}

fn cmd_add_test_target(target: Option<String>, project: Option<PathBuf>) -> Result<()> {
    let manifest = resolve_manifest(project)?;
    let editor = PbxEditor::from_path(&manifest)?;
    let doc = editor.document();

    let main_target = find_native_target(doc, target.as_deref())
        .with_context(|| "no native target found in manifest")?;
    let target_name = main_target
        .attr("name")
        .or(main_target.comment.as_deref())
        .unwrap_or("App")
        .to_string();
    let host_product = main_target
        .attr("productName")
        .unwrap_or(target_name.as_str())
        .to_string();

    let mut gen = IdGenerator::with_seen(doc.all_ids());
    let scaffold = scaffold(&target_name, &host_product, &mut gen);

    println!(
        "{}",
        format!("Scaffold for test target {}", scaffold.target_name).bold()
    );
    println!("Host target: {target_name} (product {host_product})");
    println!();

    for part in &scaffold.parts {
        println!("{}", format!("// add to the {} section:", part.section).dimmed());
        print!("{}", part.text);
        println!();
    }

    println!("{}", "Follow-up steps (manual):".bold());
    println!("  1. Paste each block into its section of {}", manifest.display());
    println!(
        "  2. Add {} /* {} */ to the PBXProject targets list",
        scaffold.ids.target, scaffold.target_name
    );
    println!(
        "  3. Add {}.xctest to the Products group and create the Tests source directory",
        scaffold.target_name
    );
    println!("  4. Open the project and add test sources to the new target");

    Ok(())
}
