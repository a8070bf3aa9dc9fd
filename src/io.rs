//! JSON documents: heap descriptions, solution reports and device catalogs

use crate::catalog::device::Device;
use crate::catalog::Compressor;
use crate::error::CompressionError;
use crate::heap::HeapModel;
use crate::solution::{ModularSummary, Solution};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bits of one weight column arriving at one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitSignal {
    pub column: usize,
    #[serde(default)]
    pub stage: usize,
    pub count: u32,
}

/// Input heap document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapDescription {
    /// Result width; outputs above it are dropped
    pub width: usize,
    pub bits: Vec<BitSignal>,
}

impl HeapDescription {
    /// Build the heap, rejecting bits outside the declared width
    pub fn to_heap(&self) -> Result<HeapModel, CompressionError> {
        let mut heap = HeapModel::new(self.width);
        for signal in &self.bits {
            if signal.column >= self.width {
                return Err(CompressionError::InvalidConfig(format!(
                    "bit signal at column {} outside width {}",
                    signal.column, self.width
                )));
            }
            if signal.count > 0 {
                heap.add_bits(signal.stage, signal.column, signal.count)?;
            }
        }
        Ok(heap)
    }

    /// Describe the input bits of `heap`
    pub fn from_heap(heap: &HeapModel) -> Self {
        let bits = heap
            .original()
            .iter()
            .enumerate()
            .flat_map(|(stage, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, &h)| h > 0)
                    .map(move |(column, &h)| BitSignal {
                        column,
                        stage,
                        count: h as u32,
                    })
            })
            .collect();
        Self {
            width: heap.width(),
            bits,
        }
    }
}

/// One placement as written to a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub compressor: String,
    pub column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_width: Option<usize>,
}

/// Output solution document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionReport {
    pub stages: Vec<Vec<PlacementRecord>>,
    pub total_area: f64,
    pub final_heights: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modular: Option<ModularSummary>,
}

impl SolutionReport {
    pub fn from_solution(solution: &Solution) -> Self {
        let catalog = solution.catalog();
        let stages = solution
            .stages()
            .iter()
            .map(|placements| {
                placements
                    .iter()
                    .map(|p| PlacementRecord {
                        compressor: catalog
                            .get(p.compressor)
                            .map_or_else(|| p.compressor.to_string(), |c| c.name.clone()),
                        column: p.column,
                        middle_width: p.middle_width,
                    })
                    .collect()
            })
            .collect();
        Self {
            stages,
            total_area: solution.total_area(),
            final_heights: solution.final_heights().to_vec(),
            modular: solution.modular().copied(),
        }
    }
}

/// Device document: a named primitive list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDocument {
    pub name: String,
    #[serde(default)]
    pub pipelined: bool,
    pub primitives: Vec<Compressor>,
}

impl DeviceDocument {
    pub fn into_device(self) -> Device {
        Device::new(self.name, self.pipelined, self.primitives)
    }

    pub fn from_device(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            pipelined: device.pipelined,
            primitives: device.primitives().to_vec(),
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(text: &str, what: &str) -> Result<T, CompressionError> {
    serde_json::from_str(text)
        .map_err(|e| CompressionError::InvalidConfig(format!("malformed {}: {}", what, e)))
}

fn render<T: Serialize>(value: &T) -> Result<String, CompressionError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CompressionError::InvalidConfig(format!("cannot serialize: {}", e)))
}

pub fn parse_heap(text: &str) -> Result<HeapModel, CompressionError> {
    parse::<HeapDescription>(text, "heap document")?.to_heap()
}

pub fn read_heap(path: &Path) -> Result<HeapModel, CompressionError> {
    parse_heap(&fs::read_to_string(path)?)
}

pub fn heap_to_json(heap: &HeapModel) -> Result<String, CompressionError> {
    render(&HeapDescription::from_heap(heap))
}

pub fn solution_to_json(solution: &Solution) -> Result<String, CompressionError> {
    render(&SolutionReport::from_solution(solution))
}

pub fn write_solution(path: &Path, solution: &Solution) -> Result<(), CompressionError> {
    fs::write(path, solution_to_json(solution)?)?;
    Ok(())
}

pub fn read_device(path: &Path) -> Result<Device, CompressionError> {
    let text = fs::read_to_string(path)?;
    Ok(parse::<DeviceDocument>(&text, "device document")?.into_device())
}

pub fn device_to_json(device: &Device) -> Result<String, CompressionError> {
    render(&DeviceDocument::from_device(device))
}
