mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cdlreq_core::{
    audit_projects, determine_project_root, export, get_registry_path, write_report, Auditor,
    CoverageReport, CoverageVerdict, Defect, ExecutedTests, ExportFormat, ProjectContext, Record,
    RecordKind, Registry, Requirement, Scaffolder, SchemaValidator, SourceLocation, Specification,
    StoredRecord, TraceabilityMatrix,
};

use crate::cli::{Cli, Command, DbCommand};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let passed = match &cli.command {
        Command::Init { directory } => handle_init(directory)?,
        Command::Create {
            kind,
            id,
            title,
            description,
            req_type,
            criteria,
            tags,
            requirements,
            implementation_unit,
            unit_test,
            output,
            directory,
        } => {
            let context = open_context(directory.as_deref(), cli.project.as_deref())?;
            let record = match parse_kind(kind)? {
                RecordKind::Requirement => Record::Requirement(Requirement {
                    id: RecordKind::Requirement.qualify(id),
                    title: title.clone(),
                    description: description.clone().unwrap_or_else(|| title.clone()),
                    req_type: req_type.clone(),
                    acceptance_criteria: criteria.clone(),
                    tags: tags.clone(),
                    source: None,
                    rationale: None,
                }),
                RecordKind::Specification => {
                    if requirements.is_empty() {
                        anyhow::bail!("A specification needs at least one --requirement");
                    }
                    let (Some(implementation_unit), Some(unit_test)) =
                        (implementation_unit, unit_test)
                    else {
                        anyhow::bail!(
                            "A specification needs --implementation-unit and --unit-test"
                        );
                    };
                    Record::Specification(Specification {
                        id: RecordKind::Specification.qualify(id),
                        title: title.clone(),
                        description: description.clone().unwrap_or_else(|| title.clone()),
                        related_requirements: requirements
                            .iter()
                            .map(|r| RecordKind::Requirement.qualify(r))
                            .collect(),
                        implementation_unit: implementation_unit.clone(),
                        unit_test: unit_test.clone(),
                        test_criteria: Vec::new(),
                        design_notes: None,
                        dependencies: Vec::new(),
                    })
                }
            };
            handle_create(&context, record, output.as_deref())?
        }
        Command::Validate {
            directory,
            requirements_only,
            specifications_only,
            format,
        } => {
            let scope = match (*requirements_only, *specifications_only) {
                (true, _) => Some(RecordKind::Requirement),
                (_, true) => Some(RecordKind::Specification),
                _ => None,
            };
            let context = open_context(directory.as_deref(), cli.project.as_deref())?;
            handle_validate(&context, scope, parse_format(format)?)?
        }
        Command::List {
            directory,
            r#type,
            format,
        } => {
            let context = open_context(directory.as_deref(), cli.project.as_deref())?;
            handle_list(&context, r#type.as_deref(), parse_format(format)?)?
        }
        Command::Trace {
            directory,
            format,
            output,
        } => {
            let context = open_context(directory.as_deref(), cli.project.as_deref())?;
            handle_trace(&context, parse_format(format)?, output.as_deref())?
        }
        Command::Coverage {
            test_list,
            directory,
            delimiter,
            fail_under,
            format,
            output,
        } => {
            let mut context = open_context(directory.as_deref(), cli.project.as_deref())?;
            if let Some(delimiter) = delimiter {
                let config = context.config.clone().with_selector_delimiter(delimiter)?;
                context.config = config;
            }
            let threshold = fail_under.unwrap_or(context.config.coverage_threshold);
            if !(0.0..=100.0).contains(&threshold) {
                anyhow::bail!("--fail-under must be between 0 and 100, got {}", threshold);
            }
            handle_coverage(
                &context,
                test_list,
                threshold,
                parse_format(format)?,
                output.as_deref(),
            )?
        }
        Command::Audit { names, format } => handle_audit(names, parse_format(format)?)?,
        Command::Db(db_cmd) => handle_db_command(db_cmd, cli.project.as_deref())?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// `table` means human-readable output; anything else must be an export format
fn parse_format(format: &str) -> Result<Option<ExportFormat>> {
    if format.eq_ignore_ascii_case("table") {
        return Ok(None);
    }
    format
        .parse::<ExportFormat>()
        .map(Some)
        .map_err(|e| anyhow::anyhow!("{}. Supported formats: table, json, yaml", e))
}

fn open_context(directory: Option<&Path>, project: Option<&str>) -> Result<ProjectContext> {
    let root = determine_project_root(directory, project)?;
    let context = ProjectContext::open(&root)?;
    Ok(match project {
        Some(name) if directory.is_none() => context.with_name(name),
        _ => context,
    })
}

/// Prints a machine-readable report, or writes it when an output file is given
fn emit<T: Serialize>(value: &T, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_report(value, path, format)?;
            println!("{} Wrote {}", "✓".green(), path.display());
        }
        None => println!("{}", export::to_string(value, format)?.trim_end()),
    }
    Ok(())
}

fn handle_init(directory: &Path) -> Result<bool> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create directory {:?}", directory))?;

    let scaffolder = Scaffolder::new(directory);
    let preview = scaffolder.preview()?;
    let written = scaffolder.apply(&preview)?;

    println!(
        "{} Initialized cdlreq project in {}",
        "✓".green(),
        directory.display()
    );
    if !written.is_empty() {
        println!("Created example files:");
        for path in &written {
            println!("  {}", path.display());
        }
    }
    for path in &preview.skipped {
        println!(
            "{} {} already exists, left unchanged",
            "!".yellow(),
            path.display()
        );
    }

    Ok(true)
}

fn parse_kind(kind: &str) -> Result<RecordKind> {
    match kind {
        "requirement" | "req" => Ok(RecordKind::Requirement),
        "specification" | "spec" => Ok(RecordKind::Specification),
        other => anyhow::bail!(
            "Unknown record kind: {}. Supported kinds: requirement, specification",
            other
        ),
    }
}

fn handle_create(context: &ProjectContext, record: Record, output: Option<&Path>) -> Result<bool> {
    let validator = SchemaValidator::new(context.config.selector_syntax());
    let location = SourceLocation::file(
        output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Scaffolder::default_record_path(&record)),
    );
    let validation = validator.validate_record(&StoredRecord::new(location, record.clone()));
    if !validation.is_valid() {
        for violation in &validation.violations {
            eprintln!("{} {}: {}", "✗".red(), violation.field, violation.message);
        }
        anyhow::bail!("Not creating invalid {} {}", record.kind(), record.id());
    }

    let path = Scaffolder::new(&context.root).create_record(&record, output)?;
    println!(
        "{} Created {} {} at {}",
        "✓".green(),
        record.kind(),
        record.id(),
        path.display()
    );
    Ok(true)
}

#[derive(Serialize)]
struct ValidationOutput<'a> {
    project: &'a str,
    files_scanned: usize,
    requirements: usize,
    specifications: usize,
    valid: bool,
    defects: Vec<&'a Defect>,
}

/// Defects without a subject (unparsable files) are reported in every scope
fn in_scope(defect: &Defect, scope: Option<RecordKind>) -> bool {
    match (scope, defect.subject.as_deref()) {
        (None, _) | (_, None) => true,
        (Some(kind), Some(subject)) => RecordKind::from_id(subject) == Some(kind),
    }
}

fn handle_validate(
    context: &ProjectContext,
    scope: Option<RecordKind>,
    format: Option<ExportFormat>,
) -> Result<bool> {
    let analysis = Auditor::new(context).analyze();
    let defects: Vec<&Defect> = analysis
        .defects
        .iter()
        .filter(|d| in_scope(d, scope))
        .collect();
    let valid = defects.is_empty();

    if let Some(format) = format {
        let output = ValidationOutput {
            project: &context.name,
            files_scanned: analysis.files_scanned,
            requirements: analysis.store.requirement_count(),
            specifications: analysis.store.specification_count(),
            valid,
            defects,
        };
        emit(&output, format, None)?;
        return Ok(valid);
    }

    println!(
        "Validated {} requirements and {} specifications from {} files in {}",
        analysis.store.requirement_count(),
        analysis.store.specification_count(),
        analysis.files_scanned,
        context.root.display()
    );

    if valid {
        println!("{}", "✓ All records are valid".green());
    } else {
        println!();
        for defect in &defects {
            println!("{} {}", "✗".red(), defect);
        }
        println!();
        println!(
            "{}",
            format!("✗ Validation failed with {} defect(s)", defects.len()).red()
        );
    }

    Ok(valid)
}

fn handle_list(
    context: &ProjectContext,
    record_type: Option<&str>,
    format: Option<ExportFormat>,
) -> Result<bool> {
    let kind = match record_type {
        None => None,
        Some("requirements") | Some("requirement") | Some("req") => Some(RecordKind::Requirement),
        Some("specifications") | Some("specification") | Some("spec") => {
            Some(RecordKind::Specification)
        }
        Some(other) => anyhow::bail!(
            "Unknown record type: {}. Supported types: requirements, specifications",
            other
        ),
    };

    let analysis = Auditor::new(context).analyze();
    let records: Vec<&Record> = analysis
        .store
        .records()
        .map(|r| &r.record)
        .filter(|r| kind.map(|k| r.kind() == k).unwrap_or(true))
        .collect();

    if let Some(format) = format {
        emit(&records, format, None)?;
        return Ok(true);
    }

    if records.is_empty() {
        println!("{}", "No records found.".yellow());
        return Ok(true);
    }

    println!("{:<16} | {:<50} | {:<30}", "ID", "Title", "Type / Traces");
    println!("{}", "-".repeat(100));

    for record in records {
        let detail = match record {
            Record::Requirement(req) => req.req_type.blue(),
            Record::Specification(spec) => spec.related_requirements.join(", ").normal(),
        };
        println!(
            "{:<16} | {:<50} | {:<30}",
            record.id(),
            truncate(record.title(), 50),
            detail
        );
    }

    Ok(true)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

fn handle_trace(
    context: &ProjectContext,
    format: Option<ExportFormat>,
    output: Option<&Path>,
) -> Result<bool> {
    let analysis = Auditor::new(context).analyze();
    let matrix = TraceabilityMatrix::build(&analysis.store, &analysis.graph);

    if let Some(path) = output {
        let format = format.unwrap_or_else(|| ExportFormat::from_path(path));
        emit(&matrix, format, Some(path))?;
        return Ok(true);
    }
    if let Some(format) = format {
        emit(&matrix, format, None)?;
        return Ok(true);
    }

    println!("{}", "Traceability Matrix".blue().bold());
    println!();
    for row in &matrix.rows {
        println!("{} {} [{}]", row.requirement.bold(), row.title, row.req_type);
        if row.specifications.is_empty() {
            println!("    {}", "(no specifications)".red());
        }
        for spec in &row.specifications {
            println!("    {} {} -> {}", spec.id.green(), spec.title, spec.unit_test);
        }
    }

    println!();
    println!(
        "{:.1}% of requirements traced to at least one specification",
        matrix.traced_percent()
    );
    if !matrix.untraced_requirements.is_empty() {
        println!(
            "{} Untraced requirements: {}",
            "!".yellow(),
            matrix.untraced_requirements.join(", ")
        );
    }

    Ok(true)
}

fn verdict_label(verdict: CoverageVerdict) -> colored::ColoredString {
    let label = verdict.to_string();
    match verdict {
        CoverageVerdict::Covered => label.green(),
        CoverageVerdict::PartiallyCovered => label.yellow(),
        CoverageVerdict::NotCovered => label.red(),
        CoverageVerdict::TargetInvalid => label.red().bold(),
    }
}

fn handle_coverage(
    context: &ProjectContext,
    test_list: &Path,
    threshold: f64,
    format: Option<ExportFormat>,
    output: Option<&Path>,
) -> Result<bool> {
    let executed = ExecutedTests::from_file(test_list, &context.config.selector_syntax())?;

    let auditor = Auditor::new(context);
    let analysis = auditor.analyze();
    let report = auditor.reconcile(&analysis, &executed);
    let passing = report.is_passing(threshold);

    if let Some(path) = output {
        let format = format.unwrap_or_else(|| ExportFormat::from_path(path));
        emit(&report, format, Some(path))?;
        print_coverage_summary(&report, threshold, passing);
        return Ok(passing);
    }
    if let Some(format) = format {
        emit(&report, format, None)?;
        return Ok(passing);
    }

    println!(
        "{:<16} | {:<18} | {:<40} | {:>7}",
        "SPEC-ID", "Verdict", "Unit test", "Matched"
    );
    println!("{}", "-".repeat(90));
    for entry in &report.specifications {
        println!(
            "{:<16} | {:<18} | {:<40} | {:>7}",
            entry.specification,
            verdict_label(entry.verdict),
            truncate(&entry.unit_test, 40),
            format!("{}/{}", entry.matched.len(), entry.discovered.len())
        );
        if let Some(reason) = &entry.reason {
            println!("    {}", reason.dimmed());
        }
        if entry.verdict == CoverageVerdict::PartiallyCovered {
            let unmatched: Vec<&str> = entry.unmatched.iter().map(String::as_str).collect();
            println!("    not executed: {}", unmatched.join(", ").yellow());
        }
    }
    for line in &report.rejected_selectors {
        println!("{} Ignored invalid selector: {}", "!".yellow(), line);
    }

    println!();
    print_coverage_summary(&report, threshold, passing);
    Ok(passing)
}

fn print_coverage_summary(report: &CoverageReport, threshold: f64, passing: bool) {
    let summary = &report.summary;
    let line = format!(
        "Coverage: {:.1}% ({}/{} covered, {} partial, {} not covered, {} invalid; threshold {:.1}%)",
        report.coverage_percent(),
        summary.covered,
        summary.total,
        summary.partially_covered,
        summary.not_covered,
        summary.target_invalid,
        threshold
    );
    if passing {
        println!("{} {}", "✓".green(), line);
    } else {
        println!("{} {}", "✗".red(), line);
    }
}

fn handle_audit(names: &[String], format: Option<ExportFormat>) -> Result<bool> {
    let registry_path = get_registry_path()?;
    let registry = Registry::load_or_default(&registry_path)?;

    let selected: Vec<String> = if names.is_empty() {
        registry.list_projects().into_iter().map(String::from).collect()
    } else {
        names.to_vec()
    };
    if selected.is_empty() {
        anyhow::bail!("No projects registered. Use 'cdlreq db register' to add one.");
    }

    let mut contexts = Vec::with_capacity(selected.len());
    let mut unavailable = Vec::new();
    for name in &selected {
        let project = registry
            .get_project(name)
            .ok_or_else(|| anyhow::anyhow!("Project '{}' not found in registry", name))?;
        match ProjectContext::open(&project.path) {
            Ok(context) => contexts.push(context.with_name(name.as_str())),
            Err(e) => unavailable.push((name.as_str(), e)),
        }
    }

    let reports = audit_projects(&contexts);
    let passed = unavailable.is_empty() && reports.iter().all(|r| r.is_clean());

    if let Some(format) = format {
        emit(&reports, format, None)?;
        for (name, e) in &unavailable {
            log::error!("{}: {}", name, e);
        }
        return Ok(passed);
    }

    println!(
        "{:<20} | {:>6} | {:>6} | {:>8} | {:>8} | {}",
        "Project", "REQ", "SPEC", "Defects", "Untraced", "Status"
    );
    println!("{}", "-".repeat(72));
    for report in &reports {
        let status = if report.is_clean() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "{:<20} | {:>6} | {:>6} | {:>8} | {:>8} | {}",
            report.project,
            report.summary.requirements,
            report.summary.specifications,
            report.summary.defects,
            report.summary.untraced_requirements,
            status
        );
    }
    for (name, e) in &unavailable {
        println!("{:<20} | {} {}", name, "✗".red(), e);
    }

    Ok(passed)
}

fn handle_db_command(cmd: &DbCommand, project: Option<&str>) -> Result<bool> {
    let registry_path = get_registry_path()?;

    match cmd {
        DbCommand::Register {
            name,
            path,
            description,
            default,
        } => {
            let mut registry = Registry::load_or_default(&registry_path)?;

            if !path.is_dir() {
                println!(
                    "{} {} is not a directory yet; registering it anyway.",
                    "!".yellow(),
                    path.display()
                );
            }
            let project_path: PathBuf = path.canonicalize().unwrap_or_else(|_| path.clone());

            registry.register_project(
                name.clone(),
                project_path.to_string_lossy().to_string(),
                description.clone().unwrap_or_default(),
            );
            if *default {
                registry.set_default_project(name)?;
            }
            registry.save(&registry_path)?;

            println!("{} Project '{}' registered successfully.", "✓".green(), name);
            if *default {
                println!("{} Project '{}' set as default.", "✓".green(), name);
            }
        }
        DbCommand::List => {
            let registry = Registry::load_or_default(&registry_path)?;
            if registry.projects.is_empty() {
                println!("{}", "No projects registered.".yellow());
                return Ok(true);
            }
            let default = registry.get_default_project().map(|(name, _)| name);
            for (name, project) in &registry.projects {
                let marker = if Some(name.as_str()) == default {
                    "*".green()
                } else {
                    " ".normal()
                };
                println!("{} {:<20} {}", marker, name, project.path);
                if !project.description.is_empty() {
                    println!("    {}", project.description.dimmed());
                }
            }
        }
        DbCommand::Path { name } => match name {
            Some(project_name) => {
                let registry = Registry::load_or_default(&registry_path)?;
                match registry.get_project(project_name) {
                    Some(project) => println!("{}", project.path),
                    None => {
                        println!(
                            "{} Project '{}' not found in registry. Use 'cdlreq db register' to add it.",
                            "!".yellow(),
                            project_name
                        );
                        return Ok(false);
                    }
                }
            }
            None => println!("{}", determine_project_root(None, project)?.display()),
        },
    }

    Ok(true)
}
