use newscheck_core::AgentKind;

use crate::agent::{AgentServices, VerificationAgent};
use crate::economic::EconomicAgent;
use crate::political::PoliticalAgent;
use crate::scientific::ScientificAgent;
use crate::technological::TechnologicalAgent;
use crate::universal::UniversalAgent;

/// One instance of every agent kind, built once per router.
pub struct AgentRoster {
    political: PoliticalAgent,
    technological: TechnologicalAgent,
    scientific: ScientificAgent,
    economic: EconomicAgent,
    universal: UniversalAgent,
}

impl AgentRoster {
    pub fn new(services: &AgentServices) -> Self {
        Self {
            political: PoliticalAgent::new(services),
            technological: TechnologicalAgent::new(services),
            scientific: ScientificAgent::new(services),
            economic: EconomicAgent::new(services),
            universal: UniversalAgent::new(services),
        }
    }

    pub fn agent(&self, kind: AgentKind) -> &dyn VerificationAgent {
        match kind {
            AgentKind::Political => &self.political,
            AgentKind::Technological => &self.technological,
            AgentKind::Scientific => &self.scientific,
            AgentKind::Economic => &self.economic,
            AgentKind::Universal => &self.universal,
        }
    }
}
