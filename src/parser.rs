use crate::config::Config;
use crate::ir::{Diagram, LevelId, LevelStyle, LinkStyle};
use crate::text_metrics::WidthEstimator;
use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%$").unwrap());
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(reaction|reaction-path|energy-diagram)\s*$").unwrap());

/// Level names: words joined by single hyphens, so `--` never occurs inside one.
const NAME: &str = r"[A-Za-z_]\w*(?:-\w+)*";

static LEVEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^level\s+(?P<name>{NAME})\s+(?P<energy>[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)(?:\s+"(?P<label>(?:[^"\\]|\\.)*)")?(?:\s+(?P<attach>attach))?\s*(?P<style>\{{.*\}})?$"#
    ))
    .unwrap()
});
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^link\s+(?P<from>{NAME})\s+(?P<to>{NAME})\s*(?P<style>\{{.*\}})?$"
    ))
    .unwrap()
});
static CHAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<chain>{NAME}(?:\s*--\s*{NAME})+)\s*(?P<style>\{{.*\}})?$"
    ))
    .unwrap()
});

#[derive(Debug, Clone)]
enum Statement {
    Level {
        energy: f32,
        label: String,
        attach: bool,
        style: LevelStyle,
    },
    Link {
        line: usize,
        from: LevelId,
        to: LevelId,
        style: LinkStyle,
    },
}

/// A parsed `.rpd` description, ready to be built into a [`Diagram`].
///
/// Level names map to the ids the levels receive when built: the n-th
/// `level` statement becomes `LevelId(n)`.
#[derive(Debug, Clone, Default)]
pub struct DiagramSource {
    statements: Vec<Statement>,
    pub names: Vec<String>,
    pub init_config: Option<String>,
}

impl DiagramSource {
    pub fn level_id(&self, name: &str) -> Option<LevelId> {
        self.names.iter().position(|n| n == name).map(LevelId)
    }

    pub fn build(&self, config: &Config) -> Result<Diagram> {
        self.populate(Diagram::new(config))
    }

    pub fn build_with(
        &self,
        config: &Config,
        estimator: impl WidthEstimator + 'static,
    ) -> Result<Diagram> {
        self.populate(Diagram::with_estimator(config, estimator))
    }

    fn populate(&self, mut diagram: Diagram) -> Result<Diagram> {
        for statement in &self.statements {
            match statement {
                Statement::Level {
                    energy,
                    label,
                    attach,
                    style,
                } => {
                    diagram.add_level(*energy, label, *attach, style.clone());
                }
                Statement::Link {
                    line,
                    from,
                    to,
                    style,
                } => {
                    diagram
                        .add_link(*from, *to, style.clone())
                        .with_context(|| format!("line {line}: link must follow both levels"))?;
                }
            }
        }
        Ok(diagram)
    }
}

pub fn parse_diagram(input: &str) -> Result<DiagramSource> {
    let lines: Vec<(usize, &str)> = input
        .lines()
        .enumerate()
        .map(|(idx, raw)| (idx + 1, raw.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    // Names resolve across the whole file; ordering is enforced when building.
    let mut ids: HashMap<&str, LevelId> = HashMap::new();
    let mut names = Vec::new();
    for (line_no, line) in &lines {
        if let Some(caps) = LEVEL_RE.captures(line) {
            let name = caps.name("name").map_or("", |m| m.as_str());
            if ids.insert(name, LevelId(names.len())).is_some() {
                bail!("line {line_no}: level '{name}' is defined twice");
            }
            names.push(name.to_string());
        }
    }

    let mut source = DiagramSource {
        names,
        ..Default::default()
    };
    let resolve = |name: &str, line_no: usize| -> Result<LevelId> {
        ids.get(name)
            .copied()
            .ok_or_else(|| anyhow!("line {line_no}: unknown level '{name}'"))
    };

    for (line_no, line) in &lines {
        let line_no = *line_no;
        if let Some(caps) = INIT_RE.captures(line) {
            source.init_config = caps.get(1).map(|m| m.as_str().to_string());
            continue;
        }
        if line.starts_with("%%") {
            continue;
        }
        if source.statements.is_empty() && HEADER_RE.is_match(line) {
            continue;
        }

        if let Some(caps) = LEVEL_RE.captures(line) {
            let energy_text = caps.name("energy").map_or("", |m| m.as_str());
            let energy: f32 = energy_text
                .parse()
                .with_context(|| format!("line {line_no}: invalid energy '{energy_text}'"))?;
            if !energy.is_finite() {
                bail!("line {line_no}: energy '{energy_text}' is out of range");
            }
            let label = match caps.name("label") {
                Some(m) => m.as_str().replace("\\\"", "\""),
                None => caps.name("name").map_or("", |m| m.as_str()).to_string(),
            };
            let style = match caps.name("style") {
                Some(m) => parse_style::<LevelStyle>(m.as_str(), line_no)?,
                None => LevelStyle::default(),
            };
            source.statements.push(Statement::Level {
                energy,
                label,
                attach: caps.name("attach").is_some(),
                style,
            });
            continue;
        }

        if let Some(caps) = LINK_RE.captures(line) {
            let from = resolve(caps.name("from").map_or("", |m| m.as_str()), line_no)?;
            let to = resolve(caps.name("to").map_or("", |m| m.as_str()), line_no)?;
            let style = match caps.name("style") {
                Some(m) => parse_style::<LinkStyle>(m.as_str(), line_no)?,
                None => LinkStyle::default(),
            };
            source.statements.push(Statement::Link {
                line: line_no,
                from,
                to,
                style,
            });
            continue;
        }

        if let Some(caps) = CHAIN_RE.captures(line) {
            let style = match caps.name("style") {
                Some(m) => parse_style::<LinkStyle>(m.as_str(), line_no)?,
                None => LinkStyle::default(),
            };
            let chain = caps.name("chain").map_or("", |m| m.as_str());
            let ids = chain
                .split("--")
                .map(|name| resolve(name.trim(), line_no))
                .collect::<Result<Vec<_>>>()?;
            for pair in ids.windows(2) {
                source.statements.push(Statement::Link {
                    line: line_no,
                    from: pair[0],
                    to: pair[1],
                    style: style.clone(),
                });
            }
            continue;
        }

        bail!("line {line_no}: unrecognized statement '{line}'");
    }

    Ok(source)
}

fn parse_style<T: serde::de::DeserializeOwned>(raw: &str, line_no: usize) -> Result<T> {
    json5::from_str(raw).map_err(|err| anyhow!("line {line_no}: invalid style {raw}: {err}"))
}
