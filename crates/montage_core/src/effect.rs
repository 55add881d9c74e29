use crate::{AspectRatio, ClipReference, JobId, Language};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch the project history listing.
    LoadHistory,
    /// Fetch the current token balance.
    LoadBalance,
    /// Submit a generation request to the service.
    GenerateVideo {
        prompt: String,
        aspect_ratio: AspectRatio,
        language: Language,
        image_url: Option<String>,
    },
    /// Fetch the purchasable credit packages.
    LoadPackages,
    /// Ask the payment service for a checkout session.
    BeginCheckout { package_id: String },
    /// Hand the external checkout URL to the shell for redirection.
    OpenCheckout { url: String },
    /// Execute a merge over the finalized, ordered clip list.
    RunMerge {
        job_id: JobId,
        clips: Vec<ClipReference>,
    },
}
