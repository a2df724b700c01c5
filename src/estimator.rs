//! Deterministic material, cost and timeline estimates for a construction
//! project.
//!
//! [`estimate`] assumes its input is in range. Form input should go through
//! [`ProjectParameters::new`], which enforces the minimum floors and area.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_FLOORS: u32 = 1;
pub const MIN_AREA_SQFT: f64 = 100.0;

const SAND_PER_BAG: f64 = 4.5;
const AGGREGATE_PER_BAG: f64 = 6.5;
const STEEL_TONS_PER_SQFT: f64 = 0.006;
const BRICKS_PER_SQFT: f64 = 8.0;

const CEMENT_RATE: f64 = 350.0;
const SAND_RATE: f64 = 30.0;
const AGGREGATE_RATE: f64 = 35.0;
const STEEL_RATE: f64 = 58000.0;
const BRICK_RATE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Residential,
    Commercial,
    Industrial,
    Infrastructure,
}

impl ProjectType {
    pub const ALL: [ProjectType; 4] = [
        ProjectType::Residential,
        ProjectType::Commercial,
        ProjectType::Industrial,
        ProjectType::Infrastructure,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProjectType::Residential => "Residential",
            ProjectType::Commercial => "Commercial",
            ProjectType::Industrial => "Industrial",
            ProjectType::Infrastructure => "Infrastructure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructionGrade {
    Basic,
    Premium,
    Luxury,
}

impl ConstructionGrade {
    pub const ALL: [ConstructionGrade; 3] = [
        ConstructionGrade::Basic,
        ConstructionGrade::Premium,
        ConstructionGrade::Luxury,
    ];

    /// Cement bags per square foot per floor.
    pub fn cement_factor(&self) -> f64 {
        match self {
            ConstructionGrade::Basic => 0.35,
            ConstructionGrade::Premium => 0.40,
            ConstructionGrade::Luxury => 0.45,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConstructionGrade::Basic => "Basic",
            ConstructionGrade::Premium => "Premium",
            ConstructionGrade::Luxury => "Luxury",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("number of floors must be at least 1, got {0}")]
    TooFewFloors(u32),
    #[error("total area must be at least 100 sq ft, got {0}")]
    AreaTooSmall(f64),
    #[error("unknown project type '{0}'")]
    UnknownProjectType(String),
    #[error("unknown construction grade '{0}'")]
    UnknownGrade(String),
}

impl FromStr for ProjectType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectType::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParameterError::UnknownProjectType(s.to_string()))
    }
}

impl FromStr for ConstructionGrade {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstructionGrade::ALL
            .into_iter()
            .find(|grade| grade.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParameterError::UnknownGrade(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectParameters {
    pub project_type: ProjectType,
    pub floors: u32,
    /// Square feet.
    pub total_area: f64,
    pub construction_grade: ConstructionGrade,
}

impl ProjectParameters {
    /// Checked constructor for user-supplied values.
    pub fn new(
        project_type: ProjectType,
        floors: u32,
        total_area: f64,
        construction_grade: ConstructionGrade,
    ) -> Result<Self, ParameterError> {
        if floors < MIN_FLOORS {
            return Err(ParameterError::TooFewFloors(floors));
        }
        // NaN fails this comparison too.
        if !(total_area >= MIN_AREA_SQFT) || !total_area.is_finite() {
            return Err(ParameterError::AreaTooSmall(total_area));
        }
        Ok(Self {
            project_type,
            floors,
            total_area,
            construction_grade,
        })
    }

    fn built_area(&self) -> f64 {
        self.total_area * f64::from(self.floors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialLine {
    pub material: &'static str,
    pub quantity: f64,
    pub unit: &'static str,
    pub estimated_cost: f64,
}

impl MaterialLine {
    fn priced(material: &'static str, quantity: f64, unit: &'static str, rate: f64) -> Self {
        Self {
            material,
            quantity,
            unit,
            estimated_cost: quantity * rate,
        }
    }

    pub fn display_quantity(&self) -> String {
        format!("{:.0} {}", self.quantity, self.unit)
    }

    /// Cost rounded to whole rupees with thousands separators.
    pub fn display_cost(&self) -> String {
        group_thousands(self.estimated_cost.round() as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseLine {
    pub phase: &'static str,
    pub duration_weeks: u32,
    /// `None` for phases that draw no cement.
    pub cement_bags: Option<f64>,
}

impl PhaseLine {
    pub fn display_allocation(&self) -> String {
        match self.cement_bags {
            Some(bags) => format!("{:.0}", bags),
            None => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialEstimate {
    pub parameters: ProjectParameters,
    pub total_cement_bags: f64,
    pub materials: Vec<MaterialLine>,
    pub timeline: Vec<PhaseLine>,
}

impl MaterialEstimate {
    pub fn total_cost(&self) -> f64 {
        self.materials.iter().map(|line| line.estimated_cost).sum()
    }

    pub fn total_weeks(&self) -> u32 {
        self.timeline.iter().map(|phase| phase.duration_weeks).sum()
    }
}

pub fn estimate(params: &ProjectParameters) -> MaterialEstimate {
    let built_area = params.built_area();
    let cement = built_area * params.construction_grade.cement_factor();
    let sand = cement * SAND_PER_BAG;
    let aggregate = cement * AGGREGATE_PER_BAG;
    let steel = built_area * STEEL_TONS_PER_SQFT;
    let bricks = built_area * BRICKS_PER_SQFT;

    let materials = vec![
        MaterialLine::priced("Wonder PPC Cement", cement, "bags", CEMENT_RATE),
        MaterialLine::priced("Sand", sand, "cubic ft", SAND_RATE),
        MaterialLine::priced("Aggregate", aggregate, "cubic ft", AGGREGATE_RATE),
        MaterialLine::priced("Steel", steel, "tons", STEEL_RATE),
        MaterialLine::priced("Bricks", bricks, "pieces", BRICK_RATE),
    ];

    MaterialEstimate {
        parameters: *params,
        total_cement_bags: cement,
        materials,
        timeline: timeline(cement),
    }
}

/// 30% / 40% / 30% of the cement across the three building phases.
fn timeline(total_cement: f64) -> Vec<PhaseLine> {
    let foundation = total_cement * 0.3;
    let structure = total_cement * 0.4;
    // Remainder rather than a third product, so the split sums back exactly.
    let finishing = total_cement - (foundation + structure);

    vec![
        PhaseLine { phase: "Foundation", duration_weeks: 4, cement_bags: Some(foundation) },
        PhaseLine { phase: "Structure", duration_weeks: 12, cement_bags: Some(structure) },
        PhaseLine { phase: "Finishing", duration_weeks: 8, cement_bags: Some(finishing) },
        PhaseLine { phase: "Completion", duration_weeks: 2, cement_bags: None },
    ]
}

pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

impl fmt::Display for MaterialEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} project, {} floor(s), {:.0} sq ft, {} construction",
            self.parameters.project_type.label(),
            self.parameters.floors,
            self.parameters.total_area,
            self.parameters.construction_grade.label()
        )?;
        writeln!(f)?;
        writeln!(f, "{:<20} {:>18} {:>20}", "Material", "Quantity", "Estimated Cost (₹)")?;
        for line in &self.materials {
            writeln!(f, "{:<20} {:>18} {:>20}", line.material, line.display_quantity(), line.display_cost())?;
        }
        writeln!(f, "{:<20} {:>18} {:>20}", "Total", "", group_thousands(self.total_cost().round() as i64))?;
        writeln!(f)?;
        writeln!(f, "{:<20} {:>18} {:>22}", "Phase", "Duration (weeks)", "Cement Required (bags)")?;
        for phase in &self.timeline {
            writeln!(f, "{:<20} {:>18} {:>22}", phase.phase, phase.duration_weeks, phase.display_allocation())?;
        }
        Ok(())
    }
}
