//! Threshold-based commentary printed next to predictions
//!
//! Presentation only. Nothing here feeds back into the prediction.

use crate::output::join_list;
use model_lib::{OutputRecord, OutputValue, RawRecord, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Low,
    Optimal,
    High,
}

/// A formulation parameter with its recommended window.
struct ParameterBand {
    feature: &'static str,
    /// Name used when suggesting an adjustment
    label: &'static str,
    low: f64,
    high: f64,
    messages: [&'static str; 3],
}

impl ParameterBand {
    fn band(&self, value: f64) -> Band {
        if value < self.low {
            Band::Low
        } else if value <= self.high {
            Band::Optimal
        } else {
            Band::High
        }
    }

    fn message(&self, band: Band) -> &'static str {
        match band {
            Band::Low => self.messages[0],
            Band::Optimal => self.messages[1],
            Band::High => self.messages[2],
        }
    }
}

const PRINTABILITY_BANDS: &[ParameterBand] = &[
    ParameterBand {
        feature: "Gelatin_pct",
        label: "gelatin concentration",
        low: 12.0,
        high: 16.0,
        messages: [
            "Very low gelatin content: may lead to poor structural support and fragile prints.",
            "Optimal gelatin content: provides strong mechanical support.",
            "Excessive gelatin content: may make the ink too viscous for smooth extrusion.",
        ],
    },
    ParameterBand {
        feature: "Silk_pct",
        label: "silk fibroin level",
        low: 4.0,
        high: 5.0,
        messages: [
            "Low silk fibroin: could reduce flexibility and make the construct brittle.",
            "Moderate silk fibroin: enhances elasticity and biocompatibility.",
            "High silk fibroin: may overly stiffen the bio-ink and reduce flow quality.",
        ],
    },
    ParameterBand {
        feature: "LH",
        label: "layer height",
        low: 0.65,
        high: 0.72,
        messages: [
            "Very low layer height: may slow down printing and risk under-building layers.",
            "Optimal layer height: supports fine resolution and stable layer bonding.",
            "High layer height: may reduce print resolution and cause poor layer adhesion.",
        ],
    },
    ParameterBand {
        feature: "PP",
        label: "extrusion pressure",
        low: 45.0,
        high: 65.0,
        messages: [
            "Low extrusion pressure: may result in under-extrusion or inconsistent flow.",
            "Optimal extrusion pressure: maintains steady, uniform deposition.",
            "High extrusion pressure: could lead to over-extrusion or structural distortion.",
        ],
    },
    ParameterBand {
        feature: "TG_min",
        label: "gelation time",
        low: 3.0,
        high: 10.0,
        messages: [
            "Very fast gelation: increases risk of nozzle clogging and uneven solidification.",
            "Controlled gelation time: allows proper crosslinking and structure formation.",
            "Prolonged gelation: may delay stabilization and reduce structural precision.",
        ],
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct Commentary {
    pub insights: Vec<String>,
    pub verdict: String,
    /// Whether the verdict is good news
    pub favorable: bool,
}

/// Commentary for a prediction, if the task has any.
pub fn for_prediction(task: Task, record: &RawRecord, outputs: &OutputRecord) -> Option<Commentary> {
    match task {
        Task::Printability => match outputs.get("Printable")? {
            OutputValue::Label(label) => Some(printability(record, label == 1)),
            OutputValue::Continuous(_) => None,
        },
        Task::Degradation => degradation(outputs),
    }
}

/// Per-parameter insights plus a verdict naming what to adjust.
pub fn printability(record: &RawRecord, printable: bool) -> Commentary {
    let mut insights = Vec::new();
    let mut adjust = Vec::new();

    for band in PRINTABILITY_BANDS {
        let Some(value) = record.get(band.feature).and_then(|v| v.as_number()) else {
            continue;
        };
        let position = band.band(value);
        insights.push(band.message(position).to_string());
        if position != Band::Optimal {
            adjust.push(band.label);
        }
    }

    let verdict = if printable {
        "This formulation is considered printable with the current parameters.".to_string()
    } else if adjust.is_empty() {
        "This formulation may not be printable for reasons outside the listed parameters. \
         Please verify the experimental setup."
            .to_string()
    } else {
        format!(
            "This formulation may not be printable. Consider adjusting the {}.",
            join_list(&adjust)
        )
    };

    Commentary {
        insights,
        verdict,
        favorable: printable,
    }
}

/// Degradation severity from weight loss and remaining stiffness.
pub fn degradation(outputs: &OutputRecord) -> Option<Commentary> {
    let weight_loss = outputs.get("Weight_Loss_Percentage")?.as_f64();
    let stiffness = outputs.get("Compressive_Stiffness_MPa")?.as_f64();

    let verdict = if weight_loss < 20.0 {
        "Low degradation: the scaffold retained most of its structure."
    } else if weight_loss < 40.0 {
        "Moderate degradation: some structural breakdown observed."
    } else {
        "High degradation: significant material loss detected."
    };

    let mechanical = if stiffness < 50.0 {
        "Mechanical stiffness has dropped notably, suggesting compromised strength."
    } else if stiffness < 80.0 {
        "Stiffness is reduced but still acceptable for moderate applications."
    } else {
        "Mechanical integrity remains largely intact."
    };

    Some(Commentary {
        insights: vec![mechanical.to_string()],
        verdict: verdict.to_string(),
        favorable: weight_loss < 20.0,
    })
}
