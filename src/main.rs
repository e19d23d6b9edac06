use chrono::{DateTime, NaiveDate, NaiveTime};
use nif_codec::nif::format::search_key::KeyDate;
use nif_codec::{
    ItemTable, ItemValueTable, NifError, Result, SearchKey, TableVariant, decode_collation,
    decode_item_table, decode_table, decode_view_format, encode_search_keys,
};
use std::env;
use std::fs;

const KINDS: &str = "collation|view-format|values|values-large|items|items-large|search-keys";

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <{}> <file>", args[0], KINDS);
        eprintln!();
        eprintln!("search-keys reads one key per line: text:<s>, number:<f>, date:<YYYY-MM-DD>,");
        eprintln!("time:<HH:MM:SS>, datetime:<RFC 3339>, numbers:<lo>,<hi>, dates:<date>..<date>");
        std::process::exit(1);
    }

    let kind = args[1].as_str();
    let path = &args[2];
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("ERROR: Cannot read {}: {}", path, e);
            std::process::exit(1);
        }
    };

    println!("Decoding {} ({} bytes) as {}", path, data.len(), kind);
    println!("{}", "=".repeat(60));

    let outcome = match kind {
        "collation" => dump_collation(&data),
        "view-format" => dump_view_format(&data),
        "values" => dump_values(&data, TableVariant::Standard),
        "values-large" => dump_values(&data, TableVariant::Large),
        "items" => dump_items(&data, TableVariant::Standard),
        "items-large" => dump_items(&data, TableVariant::Large),
        "search-keys" => dump_search_keys(&data),
        other => {
            eprintln!("ERROR: Unknown kind '{}'. Expected one of {}", other, KINDS);
            std::process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("\nERROR: Failed to decode {}", path);
        eprintln!("  {}", e);
        std::process::exit(1);
    }
}

fn dump_collation(data: &[u8]) -> Result<()> {
    let collation = decode_collation(data)?;
    println!("Flags: {:#04x} (unique: {}, flat: {})", collation.flags, collation.is_unique(), collation.is_flat());
    println!("Columns: {}", collation.descriptors.len());
    for (i, descriptor) in collation.descriptors.iter().enumerate() {
        println!(
            "  {}. {} [{:?}] {}",
            i + 1,
            descriptor.name,
            descriptor.collate_type,
            if descriptor.is_descending() { "descending" } else { "ascending" }
        );
    }
    Ok(())
}

fn dump_view_format(data: &[u8]) -> Result<()> {
    let format = decode_view_format(data)?;
    println!("Table flags: {:#06x} / {:#06x}", format.table.flags, format.table.flags2);
    println!("Columns: {}", format.columns.len());
    for (i, column) in format.columns.iter().enumerate() {
        println!(
            "  {}. item '{}', title '{}', width {}, flags3 {:#06x}",
            i + 1,
            column.format.item_name,
            column.format.title,
            column.format.display_width,
            column.flags3()
        );
        if let Some(alias) = &column.shared_column_alias {
            println!("     shared column: {}", alias);
        }
    }
    Ok(())
}

fn dump_values(data: &[u8], variant: TableVariant) -> Result<()> {
    let table: ItemValueTable<'_> = decode_table(data, variant)?;
    println!("{} value table, {} values", variant, table.len());
    for (i, value) in table.iter().enumerate() {
        match value {
            Some(value) => println!("  {}. {}", i + 1, value),
            None => println!("  {}. <absent>", i + 1),
        }
    }
    Ok(())
}

fn dump_items(data: &[u8], variant: TableVariant) -> Result<()> {
    let table: ItemTable<'_> = decode_item_table(data, variant)?;
    println!("{} item table, {} items", variant, table.len());
    for (name, value) in table.iter() {
        match value {
            Some(value) => println!("  {} = {}", name, value),
            None => println!("  {} = <absent>", name),
        }
    }
    Ok(())
}

fn dump_search_keys(data: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(data);
    let keys = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| parse_key(line).map(Some))
        .collect::<Result<Vec<_>>>()?;

    let buffer = encode_search_keys(&keys)?;
    println!("{} keys, {} bytes", keys.len(), buffer.len());
    for row in buffer.chunks(16) {
        println!("  {}", hex::encode(row));
    }
    Ok(())
}

fn parse_key(line: &str) -> Result<SearchKey> {
    let invalid = |what: &str| NifError::InvalidArgument(format!("Invalid {} key: '{}'", what, line));
    let (kind, value) = line.split_once(':').ok_or_else(|| invalid("untyped"))?;
    let value = value.trim();
    Ok(match kind {
        "text" => SearchKey::from(value),
        "number" => SearchKey::Number(value.parse().map_err(|_| invalid("number"))?),
        "numbers" => SearchKey::NumberRange(
            value
                .split(',')
                .map(|part| part.trim().parse::<f64>().map_err(|_| invalid("number range")))
                .collect::<Result<Vec<_>>>()?,
        ),
        "dates" => {
            let (lower, upper) = value.split_once("..").ok_or_else(|| invalid("date range"))?;
            SearchKey::DateRange(
                parse_date(lower.trim()).ok_or_else(|| invalid("date range"))?,
                parse_date(upper.trim()).ok_or_else(|| invalid("date range"))?,
            )
        }
        "date" | "time" | "datetime" => SearchKey::Date(parse_date(value).ok_or_else(|| invalid(kind))?),
        _ => return Err(invalid("unknown")),
    })
}

fn parse_date(value: &str) -> Option<KeyDate> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(KeyDate::DateTime(datetime));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(KeyDate::Date(date));
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S").ok().map(KeyDate::Time)
}
