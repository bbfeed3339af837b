use crate::scan::{self, Settings};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Hosts {
    #[arg(required = true, help = "Hosts or URLs to check")]
    hosts: Vec<String>,
    #[arg(short, long, help = "Output in JSON format")]
    json: bool,
}

impl Hosts {
    pub async fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let report = scan::run_hosts(&settings.config, &self.hosts).await?;

        if self.json {
            println!("{}", super::display::print_json(&report)?);
        } else {
            super::display::print_hosts(&report);
        }

        Ok(())
    }
}

#[derive(Parser)]
pub struct Prioritize {
    #[arg(required = true, help = "CVE identifiers")]
    cves: Vec<String>,
    #[arg(long, help = "CVSS threshold (default 6.0)")]
    cvss: Option<f64>,
    #[arg(long, help = "EPSS threshold (default 0.2)")]
    epss: Option<f64>,
    #[arg(short, long, help = "Maximum concurrent lookups (default 40)")]
    workers: Option<usize>,
    #[arg(short, long, help = "Output in JSON format")]
    json: bool,
}

impl Prioritize {
    pub async fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let config = settings.with_prioritizer_overrides(self.cvss, self.epss, self.workers);
        let report = scan::run_prioritize(&config, &self.cves).await?;

        if self.json {
            println!("{}", super::display::print_json(&report)?);
        } else {
            super::display::print_prioritization(&report);
        }

        Ok(())
    }
}

#[derive(Parser)]
pub struct Technology {
    #[arg(long, required_unless_present = "input", help = "Product name, as in its CPE")]
    product: Option<String>,
    #[arg(long = "version", required_unless_present = "input", help = "Product version")]
    product_version: Option<String>,
    #[arg(long, help = "Vendor name, as in its CPE")]
    vendor: Option<String>,
    #[arg(short, long, conflicts_with_all = ["product", "product_version", "vendor"], help = "JSON file with a list of technologies")]
    input: Option<PathBuf>,
    #[arg(short, long, help = "Output in JSON format")]
    json: bool,
}

impl Technology {
    fn technologies(&self) -> anyhow::Result<Vec<posture_core::Technology>> {
        if let Some(path) = &self.input {
            return scan::read_technologies(path);
        }
        match (&self.product, &self.product_version) {
            (Some(product), Some(version)) => Ok(vec![posture_core::Technology::new(
                product,
                version,
                self.vendor.as_deref(),
            )]),
            _ => anyhow::bail!("Either --input or both --product and --version are required"),
        }
    }

    pub async fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let technologies: Vec<posture_core::Technology> = self.technologies()?;
        let results = scan::run_technology(&settings.config, &technologies).await?;

        if self.json {
            println!("{}", super::display::print_json(&results)?);
        } else {
            super::display::print_technologies(&results);
        }

        Ok(())
    }
}

#[derive(Parser)]
pub struct Network {
    #[arg(short, long, help = "Saved nmap version-detection output with the vulners script")]
    input: PathBuf,
    #[arg(short, long, help = "Output in JSON format")]
    json: bool,
}

impl Network {
    pub async fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        if !self.input.exists() {
            anyhow::bail!("Path does not exist: {}", self.input.display());
        }

        let findings = scan::run_network(&settings.config, &self.input).await?;

        if self.json {
            println!("{}", super::display::print_json(&findings)?);
        } else {
            super::display::print_network(&findings);
        }

        Ok(())
    }
}
