//! In-memory entities produced by one conversion run.
use crate::logger::Logger;
use chrono::NaiveDate;

/// Marker embedded in a person's comments to record the source row.
pub const PROVENANCE_PREFIX: &str = "Excel row: ";

/// The eight levels of the geographic hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationType {
    NationalCommunity,
    Region,
    Subregion,
    GroupOfClusters,
    Cluster,
    ElectoralUnit,
    Locality,
    FocusNeighbourhood,
}

impl LocationType {
    /// All levels, most general first.
    pub const HIERARCHY: [LocationType; 8] = [
        LocationType::NationalCommunity,
        LocationType::Region,
        LocationType::Subregion,
        LocationType::GroupOfClusters,
        LocationType::Cluster,
        LocationType::ElectoralUnit,
        LocationType::Locality,
        LocationType::FocusNeighbourhood,
    ];

    /// Value stored in the `location_type` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NationalCommunity => "national_community",
            Self::Region => "region",
            Self::Subregion => "subregion",
            Self::GroupOfClusters => "group_of_clusters",
            Self::Cluster => "cluster",
            Self::ElectoralUnit => "electoral_unit",
            Self::Locality => "locality",
            Self::FocusNeighbourhood => "focus_neighbourhood",
        }
    }
}

/// How a role record finds its person at load time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersonRef {
    /// Joined on the person's external id
    ExternalId(String),
    /// Matched against the provenance text of the person from this source row
    Row(usize),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Person {
    pub external_id: Option<String>,
    pub first_names: Option<String>,
    pub family_name: Option<String>,
    pub sex: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Leaf location of the row's hierarchy
    pub location_id: Option<u32>,
    /// 1-based spreadsheet row the person came from
    pub row_number: usize,
}

impl Person {
    pub fn new(row_number: usize) -> Self {
        Person {
            row_number,
            ..Default::default()
        }
    }

    pub fn has_name(&self) -> bool {
        self.first_names.is_some() || self.family_name.is_some()
    }

    pub fn person_ref(&self) -> PersonRef {
        match &self.external_id {
            Some(id) => PersonRef::ExternalId(id.to_owned()),
            None => PersonRef::Row(self.row_number),
        }
    }

    /// Comments text marking the source row.
    pub fn provenance(&self) -> String {
        format!("{PROVENANCE_PREFIX}{}", self.row_number)
    }
}

/// A node of the geographic hierarchy, identified by (name, type, parent id).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub id: u32,
    pub name: String,
    pub kind: LocationType,
    pub parent_id: Option<u32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoleKind {
    Tutor,
    Coordinator,
    Participant,
}

impl RoleKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tutor => "tutor",
            Self::Coordinator => "coordinator",
            Self::Participant => "participant",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoleStatus {
    Current,
    Previous,
}

impl RoleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Previous => "previous",
        }
    }
}

/// One person's participation in one program.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramRole {
    pub person: PersonRef,
    pub program_code: String,
    pub kind: RoleKind,
    pub status: RoleStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl ProgramRole {
    /// Previous roles end strictly after they start; current roles have no end.
    pub fn has_consistent_dates(&self) -> bool {
        match (self.status, self.end_date) {
            (RoleStatus::Previous, Some(end_date)) => end_date > self.start_date,
            (RoleStatus::Current, None) => true,
            _ => false,
        }
    }
}

/// Counters for one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statistics {
    pub total_rows: usize,
    pub persons_created: usize,
    pub locations_created: usize,
    pub roles_created: usize,
    pub errors: usize,
    pub warnings: usize,
    pub error_details: Vec<String>,
}

impl Statistics {
    pub fn add_error(&mut self, message: String, logger: &dyn Logger) {
        logger.error(&message);
        self.errors += 1;
        self.error_details.push(message);
    }

    pub fn add_warning(&mut self, message: String, logger: &dyn Logger) {
        logger.warn(&message);
        self.warnings += 1;
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}
