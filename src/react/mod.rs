//! 协作层：Supervisor 路由、专家智能体、团队循环、上下文融合与反思

pub mod agent;
pub mod events;
pub mod fusion;
pub mod parser;
pub mod reflection;
pub mod supervisor;
pub mod team;

pub use agent::{role_prompt, Specialist, SpecialistAgent};
pub use events::{preview, send_event, EventSender, TeamEvent};
pub use fusion::{extract_keywords, ContextFusion, CONTEXT_MARKER};
pub use parser::{parse_llm_output, AgentOutput};
pub use reflection::{render_window, strip_code_fence, Reflector, MEMORY_UPDATED};
pub use supervisor::{route, route_message, route_text};
pub use team::Team;
