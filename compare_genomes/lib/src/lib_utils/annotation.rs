// Phylum labels per accession and the iTOL colour strip built from them

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use log::{info, warn};
use super::accession::truncate_accession;
use super::error::Result;

pub const UNKNOWN_PHYLUM: &str = "Unknown";

const PHYLUM_COLORS: [(&str, &str); 8] = [
    ("Ascomycota", "#377eb8"),
    ("Basidiomycota", "#e41a1c"),
    ("Mucoromycota", "#4daf4a"),
    ("Zoopagomycota", "#984ea3"),
    ("Chytridiomycota", "#ff7f00"),
    ("Blastocladiomycota", "#ffff33"),
    ("Cryptomycota", "#a65628"),
    (UNKNOWN_PHYLUM, "#cccccc"),
];

pub fn phylum_color(phylum: &str) -> Option<&'static str> {
    PHYLUM_COLORS.iter().find(|(name, _)| *name == phylum).map(|(_, color)| *color)
}

#[derive(Debug, Clone, Default)]
pub struct PhylumMap {
    labels: HashMap<String, String>,
}

impl PhylumMap {
    // first column accession, second column phylum, header row skipped
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut labels = HashMap::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() < 2 {
                continue;
            }
            let phylum = match &record[1] {
                "" => UNKNOWN_PHYLUM,
                p => p,
            };
            labels.insert(truncate_accession(&record[0]).to_string(), phylum.to_string());
        }
        Ok(Self { labels })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let map = Self::from_reader(std::fs::File::open(path)?)?;
        info!("Loaded {} phylum labels from {:?}", map.labels.len(), path);
        Ok(map)
    }

    pub fn get(&self, accession: &str) -> Option<&str> {
        self.labels.get(truncate_accession(accession)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// (node name, phylum) for every name the map knows
pub fn annotate<S: AsRef<str>>(names: &[S], phyla: &PhylumMap) -> Vec<(String, String)> {
    names.iter()
        .filter_map(|name| phyla.get(name.as_ref()).map(|p| (name.as_ref().to_string(), p.to_string())))
        .collect()
}

// iTOL DATASET_COLORSTRIP annotation file
pub fn write_colorstrip<W: Write>(writer: &mut W, annotations: &[(String, String)]) -> Result<()> {
    let mut reported: Vec<&str> = Vec::new();
    for (_, phylum) in annotations {
        if phylum_color(phylum).is_none() && !reported.contains(&phylum.as_str()) {
            warn!("Phylum '{}' has no predefined colour, it will be coloured as '{}'", phylum, UNKNOWN_PHYLUM);
            reported.push(phylum);
        }
    }
    let names: Vec<&str> = PHYLUM_COLORS.iter().map(|(name, _)| *name).collect();
    let colors: Vec<&str> = PHYLUM_COLORS.iter().map(|(_, color)| *color).collect();
    writeln!(writer, "DATASET_COLORSTRIP")?;
    writeln!(writer, "SEPARATOR TAB")?;
    writeln!(writer, "DATASET_LABEL\tPhylum Distribution")?;
    writeln!(writer, "LEGEND_TITLE\tPhylum")?;
    writeln!(writer, "LEGEND_SHAPES\t{}", vec!["1"; PHYLUM_COLORS.len()].join("\t"))?;
    writeln!(writer, "LEGEND_COLORS\t{}", colors.join("\t"))?;
    writeln!(writer, "LEGEND_LABELS\t{}", names.join("\t"))?;
    writeln!(writer, "DATA")?;
    let unknown = phylum_color(UNKNOWN_PHYLUM).unwrap_or("#cccccc");
    for (node, phylum) in annotations {
        writeln!(writer, "{}\t{}", node, phylum_color(phylum).unwrap_or(unknown))?;
    }
    Ok(())
}
