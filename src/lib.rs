//! # activation-statistics
//!
//! Task activation statistics for functional brain-imaging time series, part of the single-rust ecosystem.
//!
//! This crate fits a general linear model to every voxel of a 4D time series, converts the
//! coefficients to t-statistics and one-sided p-values, and corrects for the number of voxels
//! tested with the Benjamini-Hochberg false discovery rate procedure. The result is a map of
//! −log10(p) values at significant voxels, one volume per design-matrix column.
//!
//! ## Core Features
//!
//! - **General Linear Model**: per-voxel ordinary least squares, solved in parallel
//! - **T-statistics**: single-coefficient contrasts with a conditioning check on X'X
//! - **Multiple Testing Correction**: NaN-aware Benjamini-Hochberg masks, plus BY and Bonferroni
//! - **Task Regressors**: block designs convolved with a gamma HRF, with control/tag alternation for ASL
//! - **Activation Maps**: clamping, Gaussian smoothing, fitting, testing and masking in one call
//!
//! ## Quick Start
//!
//! Build the design matrix with [`design::hrf_task`] and pass it, together with the 4D volume,
//! to [`activation::activation_map`]. Use [`activation::ActivationAnalysis`] for the t- and
//! p-maps or to collect [`diagnostics::Diagnostic`]s.
//!
//! ## Module Organization
//!
//! - **[`model`]**: GLM solver and t-score conversion
//! - **[`testing`]**: p-values and multiple testing correction
//! - **[`design`]**: HRF task regressors and design matrices
//! - **[`preprocess`]**: clamping and spatial smoothing
//! - **[`activation`]**: the voxel-wise activation pipeline
//! - **[`slices`]**: slice montages for inspecting maps

pub mod activation;
pub mod design;
pub mod diagnostics;
pub mod model;
pub mod preprocess;
pub mod slices;
pub mod testing;
