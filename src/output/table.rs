use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::db::models::ResultTable;
use crate::generator::SeedStats;
use crate::reports::{FilterOptions, Kpis, ReportOutcome, Rendered, SectionReport};

/// Widest a single column is allowed to render.
const MAX_COL_WIDTH: usize = 30;

/// Truncate a string to fit within max_width (respecting unicode width).
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

/// Left-align `s` in `width` display columns.
fn pad(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    format!("{s}{}", " ".repeat(width.saturating_sub(w)))
}

/// Percentage with two decimals, or "n/a" when the column is not configured.
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{r:.2}%"),
        None => "n/a".to_string(),
    }
}

/// Lay a result table out as aligned text lines (header, rule, rows).
pub fn render_table(table: &ResultTable) -> Vec<String> {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|c| truncate(&c.to_string().replace('\n', " "), MAX_COL_WIDTH))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let header = UnicodeWidthStr::width(truncate(name, MAX_COL_WIDTH).as_str());
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| UnicodeWidthStr::width(c.as_str()))
                .fold(header, usize::max)
        })
        .collect();

    let line = |values: Vec<String>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| pad(v, *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(line(
        table
            .columns
            .iter()
            .map(|c| truncate(c, MAX_COL_WIDTH).to_uppercase())
            .collect(),
    ));
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    lines.push("-".repeat(total));
    for row in cells {
        lines.push(line(row));
    }
    lines
}

pub fn print_result_table(table: &ResultTable) {
    if table.is_empty() {
        println!("  No matching rows.");
        return;
    }
    for line in render_table(table) {
        println!("  {line}");
    }
    println!(
        "  ({} row{})",
        table.len(),
        if table.len() == 1 { "" } else { "s" }
    );
}

pub fn print_kpis(kpis: &Kpis) {
    println!("Key Metrics:");
    println!("  Total Stops:   {}", kpis.total_stops);
    println!("  Arrest Rate:   {}", format_rate(kpis.arrest_rate));
    println!("  Search Rate:   {}", format_rate(kpis.search_rate));
    println!("  Drug Related:  {}", format_rate(kpis.drug_rate));
}

pub fn print_section(section: &SectionReport) {
    println!("\n== {} ==", section.title);
    for report in &section.reports {
        println!("\n{}", report.title);
        match &report.outcome {
            ReportOutcome::Table { table } => print_result_table(table),
            ReportOutcome::Skipped { message } => println!("  info: {message}"),
        }
    }
}

/// Full dashboard render: filter summary, metrics, then each section.
pub fn print_rendered(rendered: &Rendered) {
    println!("Filters: {}", rendered.where_sql);
    if !rendered.params.is_empty() {
        let bound: Vec<String> = rendered
            .params
            .iter()
            .map(|(k, v)| format!(":{k} = {v}"))
            .collect();
        println!("  {}", truncate(&bound.join(", "), 96));
    }
    println!();
    print_kpis(&rendered.kpis);
    for section in &rendered.sections {
        print_section(section);
    }
}

fn print_values(label: &str, values: &[String]) {
    if values.is_empty() {
        println!("  {label:<12} (not configured or empty)");
    } else {
        println!("  {label:<12} {}", truncate(&values.join(", "), 84));
    }
}

pub fn print_options(options: &FilterOptions) {
    println!("Filter Options:");
    match &options.date_bounds {
        Some(b) => println!("  {:<12} {} .. {}", "Dates", b.min, b.max),
        None => println!("  {:<12} (not configured or empty)", "Dates"),
    }
    print_values("Countries", &options.countries);
    print_values("Genders", &options.genders);
    print_values("Races", &options.races);
    print_values("Violations", &options.violations);
}

pub fn print_seed_stats(stats: &SeedStats, path: &std::path::Path) {
    println!(
        "Inserted {} student{} into {} ({} placed)",
        stats.students,
        if stats.students == 1 { "" } else { "s" },
        path.display(),
        stats.placed
    );
}
