// Entry point and high-level CLI flow.
//
// - `menu` (the default) walks through Home / Expenditure / Income / Regions
//   interactively, asking for the date range and categories to chart.
// - `show <page>` renders a single page from flags.
// - `pages` lists the configured pages.
//
// A failing page is reported and the menu keeps running.
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tabled::Tabled;
use tracing_subscriber::EnvFilter;

use can_gdp_report::dashboard::{run_page, PageRequest, PageView};
use can_gdp_report::loader::FrameCache;
use can_gdp_report::output;
use can_gdp_report::pages::{PageConfig, PagesConfig};
use can_gdp_report::source::{CsvDirSource, StatCanSource, TableSource, STATCAN_WDS_URL};
use can_gdp_report::util::{format_int, parse_date_input};
use can_gdp_report::ReportError;

const BANNER: &str = "Chapter 5: National Income-Output";
const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Parser)]
#[command(name = "can_gdp_report", version, about = "Canadian GDP contribution reports")]
struct Cli {
    /// Read full-table CSVs (`36100104.csv`, ...) from this directory
    /// instead of downloading them.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Statistics Canada Web Data Service base URL.
    #[arg(long, global = true, default_value = STATCAN_WDS_URL)]
    base_url: String,

    /// JSON page definitions that replace the built-in pages.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Give up on a download after this many seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive page menu.
    Menu,
    /// Render one page.
    Show(ShowArgs),
    /// List configured pages.
    Pages,
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Page key, e.g. expenditure, income or regions.
    page: String,

    /// First date to include (YYYY-MM-DD); defaults to the page's start.
    #[arg(long, value_parser = parse_date_input)]
    start: Option<NaiveDate>,

    /// Last date to include (YYYY-MM-DD); defaults to today.
    #[arg(long, value_parser = parse_date_input)]
    end: Option<NaiveDate>,

    /// Category to chart. Repeat for several.
    #[arg(long = "select", conflicts_with = "no_select")]
    select: Vec<String>,

    /// Chart nothing.
    #[arg(long)]
    no_select: bool,

    /// Export the filtered data as CSV; without a value the page's file
    /// name is used.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    export_csv: Option<String>,

    /// Write the pivot, percentage and summary tables as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Rows shown in previews.
    #[arg(long, default_value_t = PREVIEW_ROWS)]
    rows: usize,
}

struct App {
    pages: PagesConfig,
    source: Box<dyn TableSource>,
    cache: FrameCache,
}

impl App {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let pages = match &cli.config {
            Some(path) => PagesConfig::from_path(path)
                .with_context(|| format!("reading page config {}", path.display()))?,
            None => PagesConfig::default(),
        };
        let source: Box<dyn TableSource> = match &cli.data_dir {
            Some(dir) => Box::new(CsvDirSource::new(dir)),
            None => Box::new(StatCanSource::new(
                &cli.base_url,
                cli.timeout_secs.map(Duration::from_secs),
            )?),
        };
        Ok(Self {
            pages,
            source,
            cache: FrameCache::new(),
        })
    }

    fn run(&self, page: &PageConfig, request: &PageRequest) -> can_gdp_report::Result<PageView> {
        run_page(page, self.source.as_ref(), &self.cache, request)
    }
}

#[derive(Tabled, Clone)]
struct PageListRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Total")]
    total: String,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Read one trimmed line from stdin; `None` at end of input.
fn read_input(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn read_choice() -> Option<String> {
    read_input("Enter choice: ")
}

/// Ask a Y/N question until answered. End of input counts as `N`.
fn prompt_yes_no(question: &str) -> bool {
    loop {
        let Some(resp) = read_input(question) else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn prompt_date(label: &str, default: NaiveDate) -> NaiveDate {
    loop {
        let Some(input) = read_input(&format!("{} [{}]: ", label, default)) else {
            return default;
        };
        if input.is_empty() {
            return default;
        }
        match parse_date_input(&input) {
            Ok(d) => return d,
            Err(e) => println!("Invalid date: {}.", e),
        }
    }
}

/// Blank keeps the page defaults, `-` selects nothing, otherwise a
/// comma-separated list of categories.
fn prompt_selection(page: &PageConfig) -> Option<Vec<String>> {
    let input = read_input(&format!(
        "Choose {}s to chart, comma separated [{}] (- for none): ",
        page.category_label.to_lowercase(),
        page.default_selection.join(", ")
    ))?;
    match input.as_str() {
        "" => None,
        "-" => Some(Vec::new()),
        list => Some(
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
    }
}

fn report_page_error(page: &PageConfig, e: &ReportError) {
    eprintln!("Error: {} could not be built: {}", page.title, e);
    if e.is_contract_drift() {
        eprintln!(
            "Note: table {} no longer matches this page's configuration.",
            page.load.table_code
        );
    }
    println!();
}

fn export_csv(page: &PageConfig, view: &PageView, path: &Path) -> Result<()> {
    output::write_frame_csv(path, &view.filtered, &page.category_label)
        .with_context(|| format!("writing {}", path.display()))?;
    println!(
        "({} rows exported to {})\n",
        format_int(view.filtered.len()),
        path.display()
    );
    Ok(())
}

fn handle_home() {
    println!("{}\n", BANNER);
    println!("Welcome to the Expenditure-Output Model and GDP Data Exploration!\n");
}

fn handle_page(app: &App, page: &PageConfig) {
    let defaults = PageRequest::defaults(page, today());
    let request = PageRequest {
        start: prompt_date("Start date", defaults.start),
        end: prompt_date("End date", defaults.end),
        selection: prompt_selection(page),
    };
    println!();

    match app.run(page, &request) {
        Ok(view) => {
            output::render_page(page, &view, PREVIEW_ROWS);
            if prompt_yes_no("Download selected as CSV (Y/N): ") {
                if let Err(e) = export_csv(page, &view, Path::new(&page.csv_file_name)) {
                    eprintln!("Write error: {:#}", e);
                }
            }
        }
        Err(e) => report_page_error(page, &e),
    }
}

fn handle_menu(app: &App) {
    loop {
        println!("{}", BANNER);
        println!("[1] Home");
        for (i, page) in app.pages.pages.iter().enumerate() {
            println!("[{}] {}", i + 2, page.title);
        }
        println!("[0] Exit\n");

        let Some(choice) = read_choice() else {
            break;
        };
        let selected = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(2))
            .and_then(|i| app.pages.pages.get(i));
        match (choice.as_str(), selected) {
            ("0", _) => break,
            ("1", _) => handle_home(),
            (_, Some(page)) => {
                println!();
                handle_page(app, page);
                if !prompt_yes_no("Back to menu (Y/N): ") {
                    break;
                }
            }
            _ => println!(
                "Invalid choice. Please enter 0 to {}.\n",
                app.pages.pages.len() + 1
            ),
        }
    }
    println!("Exiting the program.");
}

fn handle_show(app: &App, args: ShowArgs) -> Result<()> {
    let page = app.pages.find(&args.page)?;
    let mut request = PageRequest::defaults(page, today());
    if let Some(start) = args.start {
        request.start = start;
    }
    if let Some(end) = args.end {
        request.end = end;
    }
    if args.no_select {
        request.selection = Some(Vec::new());
    } else if !args.select.is_empty() {
        request.selection = Some(args.select);
    }

    let view = app
        .run(page, &request)
        .with_context(|| format!("{} could not be built", page.title))?;
    output::render_page(page, &view, args.rows);

    if let Some(path) = args.export_csv {
        let path = if path.is_empty() {
            PathBuf::from(&page.csv_file_name)
        } else {
            PathBuf::from(path)
        };
        export_csv(page, &view, &path)?;
    }
    if let Some(path) = args.json {
        output::write_json(&path, &view.contribution)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("(Contribution tables saved to {})\n", path.display());
    }
    Ok(())
}

fn handle_pages(app: &App) {
    let rows: Vec<PageListRow> = app
        .pages
        .pages
        .iter()
        .map(|p| PageListRow {
            key: p.key.clone(),
            title: p.title.clone(),
            table: p.load.table_code.clone(),
            total: p.total.name().to_string(),
        })
        .collect();
    output::preview_table_rows(&rows, usize::MAX);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let app = App::from_cli(&cli)?;
    match cli.command.unwrap_or(Command::Menu) {
        Command::Menu => handle_menu(&app),
        Command::Show(args) => handle_show(&app, args)?,
        Command::Pages => handle_pages(&app),
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
