//! # SubRip Hebrew Punctuation Fixer (srtfix)
//!
//! A CLI tool that repairs `.srt` subtitles written in Hebrew whose
//! punctuation ended up on the wrong side of the line after passing through
//! left-to-right tooling.
//!
//! ## Overview
//!
//! In a Hebrew subtitle line such as `.שלום`, the full stop was meant to
//! trail the sentence, but a naive LTR editor stored it first. `srtfix`
//! swaps the leading and trailing runs of punctuation around the untouched
//! core of each line, so RTL-aware players render it correctly again.
//!
//! ## Key Components
//!
//! - **Special Characters**: a fixed set of punctuation, symbols, space and
//!   slashes that may be moved.
//! - **Line Fixer**: swaps the leading special run with the trailing one,
//!   with a rewrite for lines ending in `" -"`.
//! - **Block Parser**: a three-state machine turning raw lines into
//!   subtitle blocks (sequence, timing, text).
//! - **Block Writer**: serializes blocks back into SRT text.
//! - **Decoding**: UTF-8 first, then windows-1255, with a sanity check that
//!   the text actually contains Hebrew.
//!
//! ## Algorithm Flow
//!
//! ```text
//! Input → Decode → Parse Blocks → Fix Every Text Line → Write <name>fix.srt
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | General error (file not found, permission denied, I/O error) |
//! | 2 | Invalid command-line arguments |
//! | 3 | Dry-run mode: changes would be made |
//! | 4 | Decode error (no Hebrew text in UTF-8 or windows-1255) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::ValueEnum;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use encoding_rs::WINDOWS_1255;
use rich_rust::terminal;
use rich_rust::{ColorSystem, Console};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Exit Codes
// ─────────────────────────────────────────────────────────────────────────────

/// Semantic exit codes for scripting and CI integration
mod exit_codes {
    /// Success - completed without errors
    pub const SUCCESS: i32 = 0;
    /// General error (file not found, permission denied, I/O error)
    pub const ERROR: i32 = 1;
    /// Invalid command-line arguments
    pub const INVALID_ARGS: i32 = 2;
    /// Dry-run mode: changes would be made
    pub const WOULD_CHANGE: i32 = 3;
    /// Decode error (no Hebrew text found in any supported encoding)
    pub const DECODE_ERROR: i32 = 4;
}

#[derive(Debug)]
struct ArgError(String);

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ArgError {}

/// The input could not be turned into Hebrew text with any supported encoding.
#[derive(Debug)]
struct DecodeError(String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug)]
struct RunOutcome {
    dry_run: bool,
    would_change: bool,
}

fn error_chain_has<T: std::error::Error + 'static>(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<T>())
}

fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if error_chain_has::<ArgError>(err) {
        exit_codes::INVALID_ARGS
    } else if error_chain_has::<DecodeError>(err) {
        exit_codes::DECODE_ERROR
    } else {
        exit_codes::ERROR
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CLI Arguments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColorMode {
    /// Auto-detect color support
    Auto,
    /// Always emit colors (even when not a TTY)
    Always,
    /// Never emit colors
    Never,
}

/// SubRip Hebrew punctuation fixer: moves misplaced punctuation in RTL subtitle lines
#[derive(Parser, Debug)]
#[command(
    name = "srtfix",
    version,
    about,
    long_about = None,
    after_help = "OUTPUT:\n  The fixed subtitles are written next to the input, replacing its last three\n  characters with \"fix.srt\" (movie.srt -> movie.fix.srt).\n\nEXIT CODES:\n  0  Success\n  1  General error (file not found, permission denied, I/O error)\n  2  Invalid command-line arguments\n  3  Dry-run mode: changes would be made\n  4  Decode error (no Hebrew text in UTF-8 or windows-1255)\n"
)]
struct Args {
    /// Input subtitle file (.srt)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Write the fixed subtitles here instead of <name>fix.srt
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to config file (default: search for .srtfixrc)
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Ignore config files
    #[arg(long = "no-config")]
    no_config: bool,

    /// Verbose output showing decoding and fixing progress
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Color output: auto, always, or never
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,

    /// Show unified diff of the fixed lines
    #[arg(short = 'd', long)]
    diff: bool,

    /// Preview changes without writing the output file (exit 0=no changes, 3=would change)
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Output a JSON report for programmatic processing
    #[arg(long, conflicts_with_all = ["verbose", "diff"])]
    json: bool,

    /// Subcommand (config management)
    #[command(subcommand)]
    command: Option<Commands>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config management actions
#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Initialize a new .srtfixrc config file
    Init {
        /// Create in home directory instead of current
        #[arg(long)]
        global: bool,
    },
    /// Show effective configuration (merged file + CLI)
    Show,
    /// Show path to active config file
    Path,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime configuration derived from CLI args
#[derive(Debug)]
struct Config {
    output: Option<PathBuf>,
    color: ColorMode,
    verbose: bool,
    diff: bool,
    dry_run: bool,
    json: bool,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            output: args.output.clone(),
            color: args.color,
            verbose: args.verbose,
            diff: args.diff,
            dry_run: args.dry_run,
            json: args.json,
        }
    }
}

/// Markup styles for verbose output; plain text when color is off
struct VerboseStyle {
    use_color: bool,
}

impl VerboseStyle {
    fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn wrap(&self, tag: &str, text: impl fmt::Display) -> String {
        if self.use_color {
            format!("[{}]{}[/]", tag, text)
        } else {
            text.to_string()
        }
    }

    fn header(&self, text: impl fmt::Display) -> String {
        self.wrap("bold cyan", text)
    }

    fn changed(&self, text: impl fmt::Display) -> String {
        self.wrap("yellow", text)
    }

    fn success(&self, text: impl fmt::Display) -> String {
        self.wrap("bold green", text)
    }

    fn stat_label(&self, text: impl fmt::Display) -> String {
        self.wrap("bold blue", text)
    }
}

/// Print a statistics summary to stderr
fn print_stats_summary(stats: &Stats, console: &Console, styles: &VerboseStyle) {
    console.print("");
    console.print(&styles.header("─── Summary ───"));

    console.print(&format!(
        "  {} {} parsed",
        styles.stat_label("Blocks:"),
        stats.blocks
    ));

    console.print(&format!(
        "  {} {} fixed, {} unchanged",
        styles.stat_label("Lines:"),
        stats.lines_changed,
        stats.text_lines.saturating_sub(stats.lines_changed)
    ));

    let elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0;
    console.print(&format!(
        "  {} {:.2}ms ({:.0} lines/sec)",
        styles.stat_label("Time:"),
        elapsed_ms,
        stats.lines_per_second()
    ));

    console.print("");
}

fn build_console(color: ColorMode) -> (Console, VerboseStyle) {
    let forced = || {
        let system = terminal::detect_color_system().unwrap_or(ColorSystem::Standard);
        let console = Console::builder()
            .force_terminal(true)
            .color_system(system)
            .build();
        (console, VerboseStyle::new(true))
    };

    match color {
        ColorMode::Never => (Console::new(), VerboseStyle::new(false)),
        ColorMode::Always => forced(),
        ColorMode::Auto if std::env::var("NO_COLOR").is_ok() => {
            (Console::new(), VerboseStyle::new(false))
        }
        ColorMode::Auto if std::env::var("FORCE_COLOR").is_ok() => forced(),
        ColorMode::Auto => {
            let console = Console::new();
            let use_color = console.is_color_enabled();
            (console, VerboseStyle::new(use_color))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config File Support
// ─────────────────────────────────────────────────────────────────────────────

/// Config file names searched in order
const CONFIG_FILENAMES: &[&str] = &[".srtfixrc", ".srtfixrc.toml", "srtfixrc.toml"];

/// Configuration loaded from a .srtfixrc file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    /// Show verbose output
    verbose: Option<bool>,
    /// Color mode: auto, always, never
    color: Option<ColorMode>,
    /// Output as JSON
    json: Option<bool>,
    /// Print a unified diff of the fixed lines
    diff: Option<bool>,
}

/// Search for a config file in `start_dir` and its ancestors, then in the home directory
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(Path::to_path_buf)
        .chain(dirs::home_dir())
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Create Config by merging file config with CLI args (CLI wins)
fn create_config(args: &Args) -> Result<Config> {
    let mut config = Config::from(args);

    if args.no_config {
        return Ok(config);
    }

    let config_path = if let Some(ref path) = args.config_file {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }
        Some(path.clone())
    } else {
        let start_dir = args
            .input
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

        find_config_file(&start_dir)
    };

    if let Some(path) = config_path {
        let file_config = load_config_file(&path)?;

        // Only apply file values where the CLI kept its default
        if !args.verbose {
            if let Some(v) = file_config.verbose {
                config.verbose = v;
            }
        }

        if args.color == ColorMode::Auto {
            if let Some(c) = file_config.color {
                config.color = c;
            }
        }

        if !args.json {
            if let Some(j) = file_config.json {
                config.json = j;
            }
        }

        if !args.diff {
            if let Some(d) = file_config.diff {
                config.diff = d;
            }
        }

        // JSON output owns stdout
        if config.json {
            config.verbose = false;
            config.diff = false;
        }
    }

    Ok(config)
}

/// Default config file content
const DEFAULT_CONFIG: &str = r#"# .srtfixrc - srtfix configuration file

# Output options
# verbose = false
# color = "auto"
# json = false

# Print a unified diff of every fixed line
# diff = false
"#;

/// Handle the config subcommand
fn run_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { global } => {
            let path = if *global {
                dirs::home_dir()
                    .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
                    .join(".srtfixrc")
            } else {
                PathBuf::from(".srtfixrc")
            };

            if path.exists() {
                return Err(anyhow::anyhow!(
                    "Config file already exists: {}",
                    path.display()
                ));
            }

            fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to create config file: {}", path.display()))?;

            eprintln!("Created config file: {}", path.display());
            Ok(())
        }

        ConfigAction::Show => {
            let args = Args::parse_from(["srtfix"]);
            let config = create_config(&args)?;

            eprintln!("Effective configuration:");
            eprintln!("  verbose: {}", config.verbose);
            eprintln!("  color: {:?}", config.color);
            eprintln!("  json: {}", config.json);
            eprintln!("  diff: {}", config.diff);

            let start_dir = std::env::current_dir().unwrap_or_default();
            if let Some(path) = find_config_file(&start_dir) {
                eprintln!();
                eprintln!("Config file: {}", path.display());
            }

            Ok(())
        }

        ConfigAction::Path => {
            let start_dir = std::env::current_dir().unwrap_or_default();
            if let Some(path) = find_config_file(&start_dir) {
                println!("{}", path.display());
                Ok(())
            } else {
                eprintln!("No config file found");
                std::process::exit(exit_codes::ERROR);
            }
        }
    }
}

fn validate_args(args: &Args) -> Result<()> {
    let Some(input) = args.input.as_ref() else {
        return Err(ArgError("an input subtitle file is required".to_string()).into());
    };

    if let Some(output) = args.output.as_ref() {
        if output == input {
            return Err(
                ArgError("--output must differ from the input file".to_string()).into(),
            );
        }
    }

    Ok(())
}

/// Statistics collected while fixing a file
#[derive(Debug, Default, Clone)]
struct Stats {
    /// Number of subtitle blocks parsed
    blocks: usize,
    /// Number of subtitle text lines seen
    text_lines: usize,
    /// Number of text lines the fixer changed
    lines_changed: usize,
    /// Processing elapsed time
    elapsed: Duration,
}

impl Stats {
    /// Calculate text lines processed per second
    fn lines_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.text_lines as f64 / secs
        } else {
            self.text_lines as f64
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON Output Structures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonOutput {
    version: &'static str,
    status: String,
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_file: Option<String>,
    encoding: SourceEncoding,
    input: InputStats,
    processing: ProcessingStats,
    output: OutputStats,
}

#[derive(Serialize)]
struct InputStats {
    lines: usize,
    bytes: usize,
}

#[derive(Serialize)]
struct ProcessingStats {
    blocks: usize,
    text_lines: usize,
    lines_changed: usize,
}

#[derive(Serialize)]
struct OutputStats {
    bytes: usize,
    changed: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Special Characters
// ─────────────────────────────────────────────────────────────────────────────

/// Characters that the line fixer is allowed to move.
///
/// Punctuation, brackets and common symbols, plus space and both slashes.
/// Everything outside this set (letters, digits, Hebrew script) is core
/// content and never moves.
const SPECIAL_CHARS: &[char] = &[
    '.', ',', ':', ';', '\'', '(', ')', '-', '?', '!', '+', '=', '*', '&', '$', '^', '%', '#',
    '@', '~', '`', '"', ' ', '/', '\\',
];

/// Check if character belongs to the movable special set
fn is_special(c: char) -> bool {
    SPECIAL_CHARS.contains(&c)
}

// ─────────────────────────────────────────────────────────────────────────────
// Line Fixing
// ─────────────────────────────────────────────────────────────────────────────

/// Swap the leading and trailing special-character runs of a subtitle line.
///
/// The trailing run only counts when a non-special character precedes it, so
/// a line made of special characters alone comes back unchanged. A trailing
/// run ending in `" -"` is rewritten to end in `"- "` so that a speaker dash
/// stays attached to the text once it moves to the front.
///
/// # Examples
///
/// ```text
/// fix_line("\"Hello, world!\"") == "!\"Hello, world\""
/// fix_line(".שלום")             == "שלום."
/// fix_line("- Wait -")          == "- Wait- "
/// ```
///
/// Applying it twice is not a no-op in general.
fn fix_line(line: &str) -> String {
    // Every special character is ASCII, so char counts equal byte counts here
    let prefix_len = line.len() - line.trim_start_matches(is_special).len();

    let suffix_start = line
        .char_indices()
        .rev()
        .find(|&(_, c)| !is_special(c))
        .map_or(line.len(), |(i, c)| i + c.len_utf8());
    let suffix = &line[suffix_start..];

    let core = line.get(prefix_len..suffix_start).unwrap_or("");
    let prefix = &line[..prefix_len];

    let mut fixed = String::with_capacity(line.len());
    match suffix.strip_suffix(" -") {
        Some(head) => {
            fixed.push_str(head);
            fixed.push_str("- ");
        }
        None => fixed.push_str(suffix),
    }
    fixed.push_str(core);
    fixed.push_str(prefix);
    fixed
}

/// Apply [`fix_line`] to every text line of every block.
///
/// Sequence and timing labels, block order and line order are preserved.
fn fix_subtitles(blocks: &[SubtitleBlock]) -> Vec<SubtitleBlock> {
    blocks
        .iter()
        .map(|block| SubtitleBlock {
            sequence: block.sequence.clone(),
            timing: block.timing.clone(),
            text: block.text.iter().map(|line| fix_line(line)).collect(),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// SRT Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// One SubRip entry.
///
/// ```text
/// 12                              ← sequence
/// 00:01:02,500 --> 00:01:04,000   ← timing
/// !שלום                           ← text (one or more lines)
/// ```
///
/// Labels are opaque: they are neither validated nor renumbered.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SubtitleBlock {
    sequence: String,
    timing: String,
    text: Vec<String>,
}

/// What the parser expects from the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    /// Next line is the sequence label
    #[default]
    Sequence,
    /// Next line is the timing label
    Timing,
    /// Accumulating text until a blank line
    Text,
}

/// Line-oriented SRT parser.
///
/// Best effort: malformed input is not rejected. A stray blank line, for
/// instance, is taken as the next sequence label and shifts every later
/// field by one.
#[derive(Debug, Default)]
struct SrtParser {
    state: ParserState,
    sequence: String,
    timing: String,
    text: Vec<String>,
    blocks: Vec<SubtitleBlock>,
}

impl SrtParser {
    fn new() -> Self {
        Self::default()
    }

    /// Consume one line and advance the state machine
    fn feed(&mut self, line: &str) {
        self.state = match self.state {
            ParserState::Sequence => {
                self.sequence = line.to_string();
                ParserState::Timing
            }
            ParserState::Timing => {
                self.timing = line.to_string();
                ParserState::Text
            }
            ParserState::Text if line.trim().is_empty() => {
                self.emit_block();
                ParserState::Sequence
            }
            ParserState::Text => {
                self.text.push(line.to_string());
                ParserState::Text
            }
        };
    }

    fn emit_block(&mut self) {
        self.blocks.push(SubtitleBlock {
            sequence: mem::take(&mut self.sequence),
            timing: mem::take(&mut self.timing),
            text: mem::take(&mut self.text),
        });
    }

    /// Flush a block left open by a missing final blank line
    fn finish(mut self) -> Vec<SubtitleBlock> {
        if self.state == ParserState::Text {
            self.emit_block();
        }
        self.blocks
    }
}

/// Parse raw lines into subtitle blocks
fn parse_blocks<S: AsRef<str>>(lines: &[S]) -> Vec<SubtitleBlock> {
    let mut parser = SrtParser::new();
    for line in lines {
        parser.feed(line.as_ref());
    }
    parser.finish()
}

/// Serialize blocks as SRT, separating blocks with one blank line.
///
/// No separator is written after the last block.
fn write_blocks<W: Write>(out: &mut W, blocks: &[SubtitleBlock]) -> io::Result<()> {
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}", block.sequence)?;
        writeln!(out, "{}", block.timing)?;
        for line in &block.text {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

/// Serialize blocks into an in-memory SRT string
fn render_blocks(blocks: &[SubtitleBlock]) -> Result<String> {
    let mut buf = Vec::new();
    write_blocks(&mut buf, blocks).context("Failed to render subtitles")?;
    Ok(String::from_utf8(buf)?)
}

/// Write blocks to `path` as UTF-8. The file is closed when the writer drops,
/// on success and on error alike.
fn save_blocks(path: &Path, blocks: &[SubtitleBlock]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    write_blocks(&mut writer, blocks)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Hebrew letter yod. Frequent enough that any real Hebrew subtitle has it.
const HEBREW_MARKER: char = 'י';

/// Maximum file size (100 MB) - reject larger files to prevent memory issues
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Encoding the input was successfully decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum SourceEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "windows-1255")]
    Windows1255,
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "UTF-8"),
            Self::Windows1255 => write!(f, "windows-1255"),
        }
    }
}

/// Decoded input file
#[derive(Debug)]
struct DecodedInput {
    text: String,
    lines: Vec<String>,
    encoding: SourceEncoding,
    bytes: usize,
}

/// Read an input file and decode it
fn read_file(path: &Path) -> Result<DecodedInput> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;

    if metadata.len() > MAX_FILE_SIZE {
        anyhow::bail!(
            "File too large: {} ({} MB). Maximum supported size is {} MB.",
            path.display(),
            metadata.len() / (1024 * 1024),
            MAX_FILE_SIZE / (1024 * 1024)
        );
    }

    let bytes =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    decode_bytes(&bytes, &path.display().to_string())
}

/// Decode raw bytes into lines.
///
/// UTF-8 is tried first and kept only if the text contains Hebrew. Anything
/// else gets a second chance as windows-1255, which must also yield Hebrew.
fn decode_bytes(bytes: &[u8], source_label: &str) -> Result<DecodedInput> {
    if bytes.contains(&0) {
        return Err(DecodeError(format!("Input appears to be binary: {}", source_label)).into());
    }

    let (content, encoding) = match std::str::from_utf8(bytes) {
        Ok(text) if text.contains(HEBREW_MARKER) => (text.to_string(), SourceEncoding::Utf8),
        _ => {
            let text = WINDOWS_1255
                .decode_without_bom_handling_and_without_replacement(bytes)
                .ok_or_else(|| {
                    DecodeError(format!(
                        "{} is neither valid UTF-8 nor windows-1255 text",
                        source_label
                    ))
                })?;

            if !text.contains(HEBREW_MARKER) {
                return Err(DecodeError(format!(
                    "No Hebrew text found in {} (tried UTF-8 and windows-1255)",
                    source_label
                ))
                .into());
            }

            (text.into_owned(), SourceEncoding::Windows1255)
        }
    };

    Ok(DecodedInput {
        lines: split_lines(&content),
        text: content,
        encoding,
        bytes: bytes.len(),
    })
}

/// Split text into lines on `\n`, `\r\n` and a lone `\r`
fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(String::from)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Path
// ─────────────────────────────────────────────────────────────────────────────

/// Replaces the last three characters of the input path
const OUTPUT_SUFFIX: &str = "fix.srt";

/// Derive the output path: `movie.srt` becomes `movie.fix.srt`.
///
/// The last three characters are dropped whatever they are, so inputs not
/// ending in `srt` get a mangled (but deterministic) name.
fn derive_output_path(input: &Path) -> Result<PathBuf> {
    let name = input.to_str().ok_or_else(|| {
        ArgError(format!(
            "Input path is not valid UTF-8: {}",
            input.display()
        ))
    })?;

    let keep = name.chars().count().saturating_sub(3);
    let mut output: String = name.chars().take(keep).collect();
    output.push_str(OUTPUT_SUFFIX);

    Ok(PathBuf::from(output))
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

/// Result of fixing a single file
struct FileResult {
    filename: String,
    encoding: SourceEncoding,
    input_lines: usize,
    input_bytes: usize,
    fixed: Vec<SubtitleBlock>,
    /// Decoded input, line endings untouched
    original_text: String,
    /// Exactly what gets written to the output file
    fixed_text: String,
    stats: Stats,
    would_change: bool,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::INVALID_ARGS,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if let Some(Commands::Config { action }) = &args.command {
        let exit_code = match run_config_command(action) {
            Ok(()) => exit_codes::SUCCESS,
            Err(err) => {
                eprintln!("Error: {:#}", err);
                exit_code_for_error(&err)
            }
        };
        std::process::exit(exit_code);
    }

    let exit_code = match run(args) {
        Ok(outcome) => {
            if outcome.dry_run && outcome.would_change {
                exit_codes::WOULD_CHANGE
            } else {
                exit_codes::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code_for_error(&err)
        }
    };

    std::process::exit(exit_code);
}

/// Parse, fix and measure one decoded input
fn process_input(
    input: DecodedInput,
    filename: String,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> Result<FileResult> {
    let start_time = Instant::now();

    if config.verbose {
        console.print(
            &styles
                .header(format!(
                    "Processing {} ({} lines, {})...",
                    filename,
                    input.lines.len(),
                    input.encoding
                ))
                .to_string(),
        );
    }

    let original = parse_blocks(&input.lines);
    let fixed = fix_subtitles(&original);

    let mut stats = Stats {
        blocks: original.len(),
        ..Stats::default()
    };
    for (before, after) in original.iter().zip(&fixed) {
        for (old, new) in before.text.iter().zip(&after.text) {
            stats.text_lines += 1;
            if old != new {
                stats.lines_changed += 1;
                // Subtitle text is printed raw, never through console markup
                if config.verbose {
                    eprintln!("  Block {}: {} → {}", before.sequence, old, new);
                }
            }
        }
    }
    let fixed_text = render_blocks(&fixed)?;
    stats.elapsed = start_time.elapsed();

    if config.verbose {
        console.print(
            &styles
                .header(format!(
                    "Parsed {} block(s), fixed {} of {} line(s)",
                    stats.blocks, stats.lines_changed, stats.text_lines
                ))
                .to_string(),
        );
    }

    Ok(FileResult {
        filename,
        encoding: input.encoding,
        input_lines: input.lines.len(),
        input_bytes: input.bytes,
        would_change: input.text != fixed_text,
        original_text: input.text,
        fixed_text,
        fixed,
        stats,
    })
}

/// Output a unified diff of the decoded input against the output file
fn output_diff(result: &FileResult, output_name: &str, proposed: bool) -> Result<()> {
    if !result.would_change {
        return Ok(());
    }

    let diff = TextDiff::from_lines(&result.original_text, &result.fixed_text);
    let mut stdout = io::stdout().lock();

    writeln!(stdout, "--- a/{}", result.filename)?;
    if proposed {
        writeln!(stdout, "+++ b/{} (proposed)", output_name)?;
    } else {
        writeln!(stdout, "+++ b/{}", output_name)?;
    }

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        writeln!(stdout, "{}", hunk.header())?;
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            let line = change.value();
            if line.ends_with('\n') {
                write!(stdout, "{}{}", sign, line)?;
            } else {
                writeln!(stdout, "{}{}", sign, line)?;
            }
        }
    }

    Ok(())
}

fn run(args: Args) -> Result<RunOutcome> {
    validate_args(&args)?;

    let config = create_config(&args)?;
    let (console, styles) = build_console(config.color);

    let input_path = args
        .input
        .as_deref()
        .ok_or_else(|| ArgError("an input subtitle file is required".to_string()))?;

    let output_path = match config.output.clone() {
        Some(path) => path,
        None => derive_output_path(input_path)?,
    };

    if config.verbose && !input_path.to_string_lossy().ends_with(".srt") {
        eprintln!(
            "Warning: {} does not end in .srt; output name will be {}",
            input_path.display(),
            output_path.display()
        );
    }

    let input = read_file(input_path)?;
    let result = process_input(
        input,
        input_path.display().to_string(),
        &config,
        &console,
        &styles,
    )?;

    output_result(&config, &console, &styles, &result, &output_path)
}

/// Write the fixed file and report according to the output mode
fn output_result(
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
    result: &FileResult,
    output_path: &Path,
) -> Result<RunOutcome> {
    let output_name = output_path.display().to_string();

    if config.json {
        if !config.dry_run {
            save_blocks(output_path, &result.fixed)?;
        }
        output_json(config, result, output_path)?;
    } else if config.dry_run {
        if config.diff {
            output_diff(result, &output_name, true)?;
        }

        if config.verbose {
            if result.would_change {
                console.print(
                    &styles
                        .changed(format!(
                            "Would write: {} ({} line(s) fixed)",
                            output_name, result.stats.lines_changed
                        ))
                        .to_string(),
                );
            } else {
                console.print(
                    &styles
                        .success(format!("No changes needed: {}", result.filename))
                        .to_string(),
                );
            }
        }
    } else {
        if config.diff {
            output_diff(result, &output_name, false)?;
        }

        save_blocks(output_path, &result.fixed)?;

        if config.verbose {
            console.print(
                &styles
                    .success(format!("Wrote {}", output_name))
                    .to_string(),
            );
        }
    }

    if config.verbose {
        print_stats_summary(&result.stats, console, styles);
    }

    Ok(RunOutcome {
        dry_run: config.dry_run,
        would_change: result.would_change,
    })
}

/// Output a JSON report for a file result
fn output_json(config: &Config, result: &FileResult, output_path: &Path) -> Result<()> {
    let json_output = JsonOutput {
        version: "1.0",
        status: if config.dry_run {
            "dry_run".to_string()
        } else {
            "success".to_string()
        },
        file: result.filename.clone(),
        output_file: if config.dry_run {
            None
        } else {
            Some(output_path.display().to_string())
        },
        encoding: result.encoding,
        input: InputStats {
            lines: result.input_lines,
            bytes: result.input_bytes,
        },
        processing: ProcessingStats {
            blocks: result.stats.blocks,
            text_lines: result.stats.text_lines,
            lines_changed: result.stats.lines_changed,
        },
        output: OutputStats {
            bytes: result.fixed_text.len(),
            changed: result.would_change,
        },
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json_output).context("Failed to serialize JSON output")?
    );

    Ok(())
}
