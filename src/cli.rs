use crate::config::{Config, load_config, merge_init_config};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::parser::parse_diagram;
use crate::render::{render_svg, write_output_png, write_output_svg};
use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rpd", version, about = "Reaction path energy diagram renderer")]
pub struct Args {
    /// Input file (.rpd or Markdown with ```rpd blocks) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file (JSON or JSON5 with theme/style/layout/render sections)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Write the computed layout as JSON to this path
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,

    /// Output resolution in dots per inch
    #[arg(long = "dpi")]
    pub dpi: Option<f32>,

    /// Log layout decisions to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut base_config = load_config(args.config.as_deref())?;
    if let Some(dpi) = args.dpi {
        if dpi <= 0.0 {
            return Err(anyhow!("--dpi must be positive, got {dpi}"));
        }
        base_config.render.dpi = dpi;
    }

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_diagram_blocks(&input)
    } else {
        vec![input]
    };

    if diagrams.is_empty() {
        return Err(anyhow!("No reaction diagrams found in input"));
    }

    if diagrams.len() == 1 {
        return render_one(
            &diagrams[0],
            &base_config,
            args.output.as_deref(),
            args.output_format,
            args.dump_layout.as_deref(),
        );
    }

    // Multiple diagrams (Markdown input)
    let base = args
        .output
        .as_deref()
        .ok_or_else(|| anyhow!("Output path required for markdown input"))?;
    let outputs = indexed_paths(base, args.output_format.extension(), diagrams.len());
    let dumps = args
        .dump_layout
        .as_deref()
        .map(|path| indexed_paths(path, "json", diagrams.len()));
    for (idx, diagram) in diagrams.iter().enumerate() {
        let dump = dumps.as_ref().map(|paths| paths[idx].as_path());
        render_one(
            diagram,
            &base_config,
            Some(&outputs[idx]),
            args.output_format,
            dump,
        )?;
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .try_init();
}

fn render_one(
    text: &str,
    base_config: &Config,
    output: Option<&Path>,
    format: OutputFormat,
    dump: Option<&Path>,
) -> Result<()> {
    let source = parse_diagram(text)?;
    let config = match source.init_config.as_deref() {
        Some(init) => merge_init_config(base_config.clone(), init)?,
        None => base_config.clone(),
    };
    let diagram = source.build(&config)?;
    let layout = compute_layout(&diagram, &config.layout)?;
    if let Some(path) = dump {
        write_layout_dump(path, &layout, &source.names)?;
    }

    let svg = render_svg(&layout, &config);
    match format {
        OutputFormat::Svg => write_output_svg(&svg, output)?,
        OutputFormat::Png => {
            let output = output.ok_or_else(|| anyhow!("Output path required for png output"))?;
            write_output_png(&svg, output, &config.render)?;
        }
    }
    info!(
        levels = diagram.len(),
        links = diagram.links().len(),
        output = %output.map_or_else(|| "stdout".to_string(), |p| p.display().to_string()),
        "rendered diagram"
    );
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        let content = std::fs::read_to_string(path)
            .map_err(|err| anyhow!("failed to read {}: {err}", path.display()))?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| matches!(ext, "md" | "markdown"));
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn extract_diagram_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut fence: Option<Fence> = None;
    let mut current = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim();
        match fence {
            None => fence = detect_diagram_fence(trimmed),
            Some(open) if is_fence_end(trimmed, open) => {
                blocks.push(current.join("\n"));
                current.clear();
                fence = None;
            }
            Some(_) => current.push(line),
        }
    }

    blocks
}

/// Marker character and run length of an open code fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
}

fn fence_run(line: &str) -> Option<(Fence, &str)> {
    let marker = line.chars().next().filter(|ch| matches!(ch, '`' | '~'))?;
    let len = line.chars().take_while(|ch| *ch == marker).count();
    if len < 3 {
        return None;
    }
    Some((Fence { marker, len }, &line[len * marker.len_utf8()..]))
}

fn detect_diagram_fence(line: &str) -> Option<Fence> {
    let (fence, info) = fence_run(line)?;
    matches!(info.trim(), "rpd" | "reaction" | "energy-diagram").then_some(fence)
}

fn is_fence_end(line: &str, open: Fence) -> bool {
    fence_run(line).is_some_and(|(fence, rest)| {
        fence.marker == open.marker && fence.len >= open.len && rest.trim().is_empty()
    })
}

/// `out.svg` becomes `out-1.svg`, `out-2.svg`, ...; a directory gets
/// `diagram-N.ext` entries.
fn indexed_paths(base: &Path, ext: &str, count: usize) -> Vec<PathBuf> {
    if base.is_dir() {
        return (1..=count)
            .map(|idx| base.join(format!("diagram-{idx}.{ext}")))
            .collect();
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("diagram");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    (1..=count)
        .map(|idx| parent.join(format!("{stem}-{idx}.{ext}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_diagram_blocks() {
        let input = r#"
text
``` rpd
level a 0
```
more
~~~reaction
level b 1
~~~
```rust
fn main() {}
```
"#;
        let blocks = extract_diagram_blocks(input);
        assert_eq!(blocks, vec!["level a 0".to_string(), "level b 1".to_string()]);
    }

    #[test]
    fn long_fences_close_on_a_matching_run() {
        let input = "````rpd\nlevel a 0\n```\nlevel b 1\n````\n~~~~ reaction\nlevel c 2\n~~~~~\n";
        let blocks = extract_diagram_blocks(input);
        assert_eq!(
            blocks,
            vec![
                "level a 0\n```\nlevel b 1".to_string(),
                "level c 2".to_string()
            ]
        );
    }

    #[test]
    fn indexed_paths_number_outputs() {
        let paths = indexed_paths(Path::new("out/profile.svg"), "svg", 2);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("out/profile-1.svg"),
                PathBuf::from("out/profile-2.svg")
            ]
        );
    }

    #[test]
    fn args_parse_flags() {
        let args = Args::try_parse_from([
            "rpd",
            "-i",
            "path.rpd",
            "-e",
            "png",
            "-o",
            "out.png",
            "--dpi",
            "300",
            "--dumpLayout",
            "layout.json",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Png);
        assert_eq!(args.dpi, Some(300.0));
        assert_eq!(args.dump_layout, Some(PathBuf::from("layout.json")));
    }
}
