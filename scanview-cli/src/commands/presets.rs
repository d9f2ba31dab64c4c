//! Presets command - print the preset table.

use scanview::Preset;

use crate::error::CliError;

/// Run the presets command.
pub fn run(json: bool) -> Result<(), CliError> {
    if json {
        return print_json();
    }

    println!(
        "{:<8} {:>4} {:>8} {:>9} {:>7} {:>5} {:>6} {:>7} {:>7}",
        "Preset", "SSE", "Memory", "Density", "Factor", "Cone", "Scale", "Atten.", "Points"
    );
    for preset in Preset::ORDERED {
        let b = preset.bundle();
        println!(
            "{:<8} {:>4} {:>5} MB {:>9} {:>7} {:>5.2} {:>6.1} {:>7} {:>6.1}M",
            preset.name(),
            b.maximum_screen_space_error,
            b.maximum_memory_usage_mb,
            b.dynamic_screen_space_error_density,
            b.dynamic_screen_space_error_factor,
            b.foveated_cone_size,
            b.geometric_error_scale,
            b.maximum_attenuation,
            b.point_budget as f64 / 1_000_000.0,
        );
    }
    println!();
    println!("Default: {}", Preset::DEFAULT);

    Ok(())
}

fn print_json() -> Result<(), CliError> {
    let mut entries = Vec::with_capacity(Preset::ORDERED.len());
    for preset in Preset::ORDERED {
        let mut entry = serde_json::to_value(preset.bundle())?;
        if let Some(fields) = entry.as_object_mut() {
            fields.insert("name".to_string(), preset.name().into());
        }
        entries.push(entry);
    }
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
