use std::path::Path;

use console::Style;
use ccdred_core::pipeline::{GroupOutcome, NightManifest, ReductionConfig, RunReport};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    error: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            error: Style::new().red().bold(),
        }
    }
}

fn on_off(s: &Styles, enabled: bool, text: &str) -> String {
    if enabled {
        s.method.apply_to(text).to_string()
    } else {
        s.disabled.apply_to("disabled").to_string()
    }
}

pub fn print_reduce_summary(config: &ReductionConfig, manifest_path: &Path, manifest: &NightManifest) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("CCD Reduction"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Manifest"),
        s.path.apply_to(manifest_path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Raw data"),
        s.path.apply_to(config.raw_path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Reduced"),
        s.path.apply_to(config.red_path.display())
    );
    println!(
        "  {:<14}{} / {}",
        s.label.apply_to("Setup"),
        s.value.apply_to(&manifest.instrument),
        s.value.apply_to(&manifest.technique)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Groups"),
        s.value.apply_to(format!(
            "{} ({} frames)",
            manifest.groups.len(),
            manifest.frame_count()
        ))
    );
    println!();

    println!("  {}", s.header.apply_to("Calibration"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bias"),
        on_off(&s, !config.ignore_bias, "master bias")
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Flats"),
        on_off(&s, !config.ignore_flats, &format!("{:?}", config.flat_normalize))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Saturation"),
        s.value.apply_to(config.saturation_limit)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Cosmic"),
        s.method.apply_to(config.cosmic)
    );
    println!();
}

pub fn print_run_report(report: &RunReport) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Regions"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Trim"),
        s.value.apply_to(&report.trim_section)
    );
    match report.overscan_region {
        Some(ref region) => println!(
            "    {:<12}{}",
            s.label.apply_to("Overscan"),
            s.value.apply_to(region)
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Overscan"),
            s.disabled.apply_to("none")
        ),
    }
    println!();

    println!("  {}", s.header.apply_to("Groups"));
    for group in &report.groups {
        let label = format!("{:>3}. {}", group.index + 1, group.obstypes);
        match &group.outcome {
            GroupOutcome::MasterBias { name, combined } => println!(
                "    {:<28}{} {}",
                s.label.apply_to(label),
                s.value.apply_to(name),
                s.label.apply_to(format!("({combined} frames)"))
            ),
            GroupOutcome::BiasSkipped => println!(
                "    {:<28}{}",
                s.label.apply_to(label),
                s.disabled.apply_to("bias disabled")
            ),
            GroupOutcome::MasterFlat {
                name, normalized, ..
            } => println!(
                "    {:<28}{} {}",
                s.label.apply_to(label),
                s.value.apply_to(name),
                s.label.apply_to(format!("-> {normalized}"))
            ),
            GroupOutcome::Science {
                target,
                flat,
                slit_trim,
                frames,
            } => {
                let target = if target.is_empty() {
                    "science"
                } else {
                    target.as_str()
                };
                println!(
                    "    {:<28}{} {}",
                    s.label.apply_to(label),
                    s.method.apply_to(target),
                    s.label.apply_to(format!(
                        "flat {}{}",
                        flat.as_deref().unwrap_or("none"),
                        slit_trim
                            .as_ref()
                            .map(|t| format!(", slit {t}"))
                            .unwrap_or_default()
                    ))
                );
                for frame in frames {
                    match frame.output {
                        Some(ref out) => println!("        {}", s.path.apply_to(out)),
                        None => println!(
                            "        {} {}",
                            s.error.apply_to(&frame.source),
                            s.label.apply_to("not reduced")
                        ),
                    }
                    for note in &frame.notes {
                        println!("          {}", s.disabled.apply_to(note));
                    }
                }
            }
            GroupOutcome::Unprocessable { obstypes } => println!(
                "    {:<28}{}",
                s.label.apply_to(label),
                s.disabled.apply_to(format!("nothing to do for {obstypes}"))
            ),
            GroupOutcome::Failed { error } => println!(
                "    {:<28}{}",
                s.label.apply_to(label),
                s.error.apply_to(error)
            ),
        }
    }
    println!();

    let failed = report.failed_groups();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Reduced"),
        s.value.apply_to(format!("{} frames", report.reduced_frames()))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Masters"),
        s.value.apply_to(report.masters().len())
    );
    if failed > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Failed"),
            s.error.apply_to(format!("{failed} groups"))
        );
    }
    println!();
}
