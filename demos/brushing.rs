/// Brushing Example
///
/// This example demonstrates:
/// - Merging an all-data table with a zoomed subset
/// - Reading the brushed and all-data bands
/// - Gap filling a time axis through the merged view
/// - Stacking constant and interval columns on top
///
/// Run with `RUST_LOG=debug` to see the merge decisions.
use brushview::{
    shared, AppendView, ColumnType, ColumnValue, DataTable, DerivedSumView, GapFill, MergeView, Schema, Table,
    TimeSeriesRow, ViewError,
};

fn monthly(rows: &[(&str, i32, i64, i64)]) -> Result<DataTable, ViewError> {
    let schema = Schema::new(vec![
        ("Region".to_string(), ColumnType::String, false),
        ("Month".to_string(), ColumnType::Int32, false),
        ("Open".to_string(), ColumnType::Int64, true),
        ("Gain".to_string(), ColumnType::Int64, true),
    ]);
    let rows = rows
        .iter()
        .map(|(region, month, open, gain)| {
            vec![
                ColumnValue::String(region.to_string()),
                ColumnValue::Int32(*month),
                ColumnValue::Int64(*open),
                ColumnValue::Int64(*gain),
            ]
        })
        .collect();
    DataTable::from_rows("monthly".to_string(), schema, rows)
}

fn print_table(table: &dyn Table) {
    let headers: Vec<String> = (0..table.col_count())
        .map(|c| table.header(c).unwrap_or_default())
        .collect();
    println!("   {}", headers.join(" | "));
    for row in 0..table.row_count() {
        let cells: Vec<String> = (0..table.col_count())
            .map(|c| match table.value(c, row) {
                ColumnValue::Null => "-".to_string(),
                ColumnValue::String(s) => s,
                other => other.to_f64().map_or_else(|| format!("{:?}", other), |n| n.to_string()),
            })
            .collect();
        println!("   {}", cells.join(" | "));
    }
}

fn main() -> Result<(), ViewError> {
    env_logger::init();
    println!("=== BrushView Brushing Example ===\n");

    // 1. The full dataset and a zoomed window over months 3-4
    println!("1. Creating all-data and brushed tables...");
    let all = monthly(&[
        ("East", 1, 10, 1),
        ("East", 3, 12, 2),
        ("East", 4, 15, -1),
        ("West", 1, 20, 4),
        ("West", 4, 22, 3),
    ])?;
    let mut brushed = monthly(&[("East", 3, 12, 2), ("East", 4, 15, -1), ("North", 4, 5, 5)])?;
    brushed.add_calc_row(Box::new(TimeSeriesRow::new("Month", 1.0, GapFill::Zero)));
    println!("   all: {} rows, brushed: {} rows\n", all.row_count(), brushed.row_count());

    // 2. Merge them
    println!("2. Merging...");
    let merged = MergeView::new(shared(all), shared(brushed));
    println!(
        "   brushed band: {} rows ({} dropped), all-data band: {} rows",
        merged.brushed_row_count(),
        merged.dropped_rows(),
        merged.all_row_count()
    );
    println!("   key columns: {:?}\n", merged.dims());
    print_table(&merged);

    // 3. Intervals and a constant series marker on top
    println!("\n3. Adding an interval and a constant column...");
    let mut derived = DerivedSumView::new(shared(merged));
    let interval = derived.add_interval("Open", "Gain");
    let mut appended = AppendView::new(shared(derived));
    appended.add_dimension("Series", ColumnValue::String("main".to_string()));
    print_table(&appended);
    println!("\n   {} of row 0: {:?}", interval, appended.value_of(&interval, 0));

    println!("\n=== Example Complete ===");
    Ok(())
}
