// FILE: src/cli/handlers.rs
use crate::{
    compile_file, extract_schema, generate_compatibility_css, process_theme, theme::load_theme, theme_to_css,
    CompilationStats, CompilerError, CompilerOptions, ProcessedTheme, Result, SchemaUsage,
};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const DEFAULT_OUTPUT_DIRECTORY: &str = "dist";

// --- COMPILE ---
pub fn handle_compile_command(
    cli: &super::Cli,
    matches: &clap::ArgMatches,
    options: &CompilerOptions,
) -> Result<()> {
    let input_path = Path::new(required(matches, "input")?);
    let output_dir = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .or(cli.output_directory())
        .unwrap_or(DEFAULT_OUTPUT_DIRECTORY);
    let output_dir = Path::new(output_dir);

    let compile_start = Instant::now();
    let mut all_stats = Vec::new();

    if input_path.is_dir() {
        let files = collect_css_files(input_path)?;
        println!("🔨 Compiling {} files from {} -> {}", files.len(), input_path.display(), output_dir.display());
        for file in files {
            let relative = file.strip_prefix(input_path).unwrap_or(&file);
            let target_dir = match relative.parent() {
                Some(parent) => output_dir.join(parent),
                None => output_dir.to_path_buf(),
            };
            let stats = compile_file(&file, &target_dir, options)?;
            println!("   {} ({} usages)", relative.display(), stats.usage_count);
            all_stats.push(stats);
        }
    } else {
        println!("🔨 Compiling {} -> {}", input_path.display(), output_dir.display());
        all_stats.push(compile_file(input_path, output_dir, options)?);
    }

    let usage_count: usize = all_stats.iter().map(|stats| stats.usage_count).sum();
    println!("✅ Compilation successful!");
    println!("   Usages: {}", usage_count);
    println!("   Time: {:.2}ms", compile_start.elapsed().as_millis());

    if matches.get_flag("stats") {
        print_detailed_stats(&all_stats)?;
    }
    Ok(())
}

fn print_detailed_stats(stats: &[CompilationStats]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

// --- THEME ---
pub fn handle_theme_command(matches: &clap::ArgMatches, options: &CompilerOptions) -> Result<()> {
    let input_path = Path::new(required(matches, "input")?);
    let (theme, css) = build_theme_css(input_path, options)?;
    log::info!(
        "Theme {} has {} keys in {} contexts",
        input_path.display(),
        theme.key_count(),
        theme.contextual.len()
    );

    if let Some(json_path) = matches.get_one::<String>("json") {
        fs::write(json_path, serde_json::to_string_pretty(&theme)?)?;
        println!("📝 Processed theme written to {}", json_path);
    }
    write_output(matches.get_one::<String>("output"), &css)
}

fn build_theme_css(path: &Path, options: &CompilerOptions) -> Result<(ProcessedTheme, String)> {
    let theme = process_theme(&load_theme(path)?)?;
    let css = theme_to_css(
        &theme,
        &options.custom_property_prefix,
        &options.context_class_name_prefix,
    );
    Ok((theme, css))
}

// --- COMPAT ---
pub fn handle_compat_command(matches: &clap::ArgMatches, options: &CompilerOptions) -> Result<()> {
    let theme_path = Path::new(required(matches, "theme")?);
    let inputs: Vec<PathBuf> = matches
        .get_many::<String>("input")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();

    let css = build_compat_css(theme_path, &inputs, options)?;
    write_output(matches.get_one::<String>("output"), &css)
}

fn build_compat_css(theme_path: &Path, inputs: &[PathBuf], options: &CompilerOptions) -> Result<String> {
    let theme = process_theme(&load_theme(theme_path)?)?;

    let mut usages: Vec<SchemaUsage> = Vec::new();
    for input in inputs {
        for file in collect_css_files(input)? {
            let css = fs::read_to_string(&file)?;
            let schema = extract_schema(&css, &file.to_string_lossy(), &options.custom_property_prefix)?;
            log::debug!("{}: {} usages", schema.path, schema.usages.len());
            usages.extend(schema.usages);
        }
    }
    generate_compatibility_css(&theme, &usages, options)
}

// --- SCHEMA ---
pub fn handle_schema_command(matches: &clap::ArgMatches, options: &CompilerOptions) -> Result<()> {
    let input_path = required(matches, "input")?;
    let css = fs::read_to_string(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path, e),
    })?;
    let schema = extract_schema(&css, input_path, &options.custom_property_prefix)?;
    write_output(matches.get_one::<String>("output"), &serde_json::to_string_pretty(&schema)?)
}

// --- HELPERS ---
fn required<'a>(matches: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| CompilerError::InvalidFormat {
            message: format!("Missing argument '{}'", name),
        })
}

fn write_output(output_path: Option<&String>, content: &str) -> Result<()> {
    match output_path {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
            println!("✅ Written to {}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// `path` itself if it is a file, otherwise every `.css` file below it.
fn collect_css_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CompilerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        if entry.file_type().is_file() && entry.path().extension().map_or(false, |ext| ext == "css") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const THEME: &str = "components:
  gap: 4px
  button:
    color:
      $light: white
      $dark: black
";

    #[test]
    fn test_collect_css_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("b.css"), "").unwrap();
        fs::write(temp_dir.path().join("a.css"), "").unwrap();
        fs::write(temp_dir.path().join("nested/c.css"), "").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "").unwrap();

        let files = collect_css_files(temp_dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|file| file.strip_prefix(temp_dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.css", "b.css", "nested/c.css"]);

        let single = temp_dir.path().join("a.css");
        assert_eq!(collect_css_files(&single).unwrap(), vec![single]);
    }

    #[test]
    fn test_theme_and_compat_from_compiled_output() {
        let temp_dir = TempDir::new().unwrap();
        let options = CompilerOptions::default();

        let theme_path = temp_dir.path().join("theme.yaml");
        fs::write(&theme_path, THEME).unwrap();
        let (theme, css) = build_theme_css(&theme_path, &options).unwrap();
        assert_eq!(theme.key_count(), 3);
        assert!(css.starts_with(":root {"));
        assert!(css.contains("--makeup-gap: 4px;"));

        let source_path = temp_dir.path().join("button.css");
        fs::write(
            &source_path,
            "@component button;\n.button { color: cfg(color); margin: cfg('/gap'); }\n",
        )
        .unwrap();
        let dist = temp_dir.path().join("dist");
        compile_file(&source_path, &dist, &options).unwrap();

        let compat = build_compat_css(&theme_path, &[dist], &options).unwrap();
        assert!(compat.contains(".button {\n  margin: 4px;\n}"));
        assert!(compat.contains(".makeup\\/context\\/dark .button {\n  color: black;\n}"));
        assert!(compat.contains(".makeup\\/context\\/light .button {\n  color: white;\n}"));
    }

    #[test]
    fn test_compat_reports_unknown_keys() {
        let temp_dir = TempDir::new().unwrap();
        let theme_path = temp_dir.path().join("theme.yaml");
        fs::write(&theme_path, THEME).unwrap();
        let compiled = temp_dir.path().join("a.css");
        fs::write(&compiled, ".a { padding: var(--makeup-missing); }\n").unwrap();

        let err = build_compat_css(&theme_path, &[compiled], &CompilerOptions::default()).unwrap_err();
        assert!(matches!(err, CompilerError::UnknownKey { ref key, .. } if key == "missing"));
    }
}
