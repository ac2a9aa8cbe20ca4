
/// Consensus allele enumeration between anchors
pub mod allele_enumeration;
/// Bubbles, the bubble graph, and the read-vs-allele scorer
pub mod bubble_graph;
/// Candidate variant detection and anchor selection over the POA
pub mod candidate_sites;
/// The pair-HMM scoring seam and its edit-distance default
pub mod scorer;
