//! Output schema for color reports.
//!
//! Messages are declared with `prost` derives directly so the crate builds
//! without `protoc`. Field tags are part of the on-disk format; never reuse one.

pub mod proto {
    /// Where a report's frames came from.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SourceMetadata {
        #[prost(string, tag = "1")]
        pub file_path: String,
        /// Frame count reported by the container (0 if unknown).
        #[prost(uint64, tag = "2")]
        pub frame_count: u64,
        #[prost(double, tag = "3")]
        pub fps: f64,
    }

    /// Average color of a single sampled frame, in RGB order.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FrameColor {
        #[prost(uint64, tag = "1")]
        pub frame_index: u64,
        #[prost(double, tag = "2")]
        pub timestamp_seconds: f64,
        #[prost(double, tag = "3")]
        pub red: f64,
        #[prost(double, tag = "4")]
        pub green: f64,
        #[prost(double, tag = "5")]
        pub blue: f64,
    }

    /// Result of sampling one video.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ColorReport {
        #[prost(message, optional, tag = "1")]
        pub source: Option<SourceMetadata>,
        /// Sampling stride the frames were taken at.
        #[prost(uint32, tag = "2")]
        pub interval: u32,
        #[prost(message, repeated, tag = "3")]
        pub frames: Vec<FrameColor>,
    }
}
