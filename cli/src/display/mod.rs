use colored::{ColoredString, Colorize};
use posture_core::report::HostSummary;
use posture_core::{
    CvePriorityResult, HostCheckReport, NetworkVulnerabilities, PrioritizationReport, Priority, PrioritySummary,
    Protocol, TechnologyVulnerabilityResult,
};
use serde::Serialize;

fn paint(priority: Priority, label: &str) -> ColoredString {
    match priority {
        Priority::P1Plus => label.red(),
        Priority::P1 => label.bright_red(),
        Priority::P2 => label.bright_yellow(),
        Priority::P3 => label.yellow(),
        Priority::P4 => label.green(),
    }
}

fn colored_priority(priority: Priority) -> ColoredString {
    paint(priority, priority.as_str())
}

fn rule(width: usize) -> String {
    "-".repeat(width)
}

fn print_cve_table<'a>(results: impl IntoIterator<Item = &'a CvePriorityResult>) {
    println!(
        "{:<18}{:<13}{:<9}{:<6}{:<10}{:<10}CISA_KEV",
        "CVE-ID", "PRIORITY", "EPSS", "CVSS", "VERSION", "SEVERITY"
    );
    println!("{}", rule(75));
    for result in results {
        // pad before colouring so escape codes do not skew the columns
        let priority = paint(result.priority, &format!("{:<13}", result.priority.as_str()));
        println!(
            "{:<18}{}{:<9.4}{:<6.1}{:<10}{:<10}{}",
            result.cve_id,
            priority,
            result.epss,
            result.cvss_base_score,
            result.cvss_version.to_string().trim_start_matches("CVSS "),
            result.cvss_severity,
            if result.cisa_kev { "TRUE" } else { "FALSE" }
        );
    }
}

fn print_priority_summary(summary: &PrioritySummary) {
    for priority in Priority::ALL {
        let count = summary.count(priority);
        if count > 0 {
            println!("  {}: {}", colored_priority(priority), count);
        }
    }
}

pub fn print_prioritization(report: &PrioritizationReport) {
    println!("\n{}", "=".repeat(75));
    println!("CVE Prioritization Report");
    println!("{}", "=".repeat(75));
    println!(
        "Thresholds: CVSS >= {}, EPSS >= {}",
        report.thresholds.cvss, report.thresholds.epss
    );
    println!("Duration: {}ms", report.elapsed);
    println!();

    println!("Summary:");
    println!("  Requested: {}", report.requested);
    println!("  Prioritized: {}", report.summary.total());
    print_priority_summary(&report.summary);
    println!();

    if !report.results.is_empty() {
        print_cve_table(report.by_priority());
        println!();
    }

    if !report.dropped.is_empty() {
        println!("No data (dropped):");
        for cve_id in &report.dropped {
            println!("  - {}", cve_id.dimmed());
        }
        println!();
    }

    if report.summary.priority_1_plus > 0 {
        println!("{}", "Actively exploited vulnerabilities found (CISA KEV)!".red().bold());
    }
}

fn print_host_summary(summary: &HostSummary) {
    println!("  Secure: {}", summary.secure.to_string().green());
    println!("  Certificate not trusted: {}", summary.untrusted.to_string().yellow());
    println!("  Not secure: {}", summary.not_secure.to_string().red());
    println!("  Errors: {}", summary.errors.to_string().red());
}

pub fn print_hosts(report: &HostCheckReport) {
    println!("\n{}", "=".repeat(60));
    println!("Host Check Report");
    println!("{}", "=".repeat(60));
    println!("Duration: {}ms", report.elapsed);
    println!();

    println!("Summary:");
    print_host_summary(&report.summary);
    println!();

    for (host, result) in &report.results {
        let protocol = match result.protocol {
            Protocol::Https => "https".green(),
            Protocol::Http => "http".red(),
            Protocol::Undefined => "undefined".dimmed(),
        };
        println!("  {} [{}]", host.bold(), protocol);

        if let Some(description) = &result.description {
            let description = if result.is_secure() {
                description.green()
            } else {
                description.yellow()
            };
            println!("    {}", description);
        }
        if let Some(error) = &result.error {
            println!("    {}", error.red());
        }
        if let Some(raw) = &result.raw_error {
            println!("    {}", raw.dimmed());
        }
    }
    println!();

    if report.all_secure() {
        println!("{}", "All hosts are served securely.".green());
    }
}

pub fn print_technologies(results: &[TechnologyVulnerabilityResult]) {
    for result in results {
        let vendor = result.vendor.as_deref().unwrap_or("*");
        println!("\n{}", "=".repeat(75));
        println!("{} {} (vendor: {})", result.product.bold(), result.version, vendor);
        println!("{}", "=".repeat(75));

        if let Some(error) = &result.error {
            let rendered = serde_json::to_string(error).unwrap_or_else(|_| format!("{:?}", error));
            println!("  {}", rendered.red());
            continue;
        }
        if result.vulnerabilities.is_empty() {
            println!("  No known vulnerabilities");
            continue;
        }

        print_priority_summary(&PrioritySummary::from_results(result.vulnerabilities.values()));
        println!();
        let mut ordered: Vec<&CvePriorityResult> = result.vulnerabilities.values().collect();
        ordered.sort_by_key(|r| r.priority);
        print_cve_table(ordered);
    }
    println!();
}

pub fn print_network(findings: &NetworkVulnerabilities) {
    for (host, ports) in findings {
        println!("\n{}", "=".repeat(75));
        println!("{}", host.bold());
        println!("{}", "=".repeat(75));

        for (port_id, port) in ports {
            println!(
                "  {}/{} {} {} {}",
                port_id, port.protocol, port.service.name, port.service.product, port.service.version
            );
            for (cve_id, vulnerability) in &port.vulnerabilities {
                let priority = match &vulnerability.priority_details {
                    Some(details) => colored_priority(details.priority),
                    None => "no data".dimmed(),
                };
                let exploit = if vulnerability.is_exploit { " exploit" } else { "" };
                println!(
                    "    {:<18}{:<6}{}{}",
                    cve_id,
                    vulnerability.cvss.map(|c| format!("{:.1}", c)).unwrap_or_default(),
                    priority,
                    exploit.red()
                );
            }
        }
    }
    println!();
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
