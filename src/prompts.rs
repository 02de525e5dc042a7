//! Prompt-template library keyed by dataset mode.
//!
//! Template text is domain material, kept verbatim; rendering is plain
//! placeholder substitution so literal braces in the requested JSON shape
//! survive untouched.

use std::str::FromStr;

use crate::error::EditsetError;
use crate::types::Mode;

/// Instruction-conditioned template for direct-caption (egovid) records.
const DIRECT_CAPTION_TEMPLATE: &str = r#"
Role: You are a professional Image Editing Prompt Expert.
Task: Generate a MINIMAL and PRECISE image editing prompt based on the Start Frame and the Instruction.

Goal: Translate the process-oriented "Instruction" into a result-oriented "Edit Command" that describes the final state. The change should be visible but minimal to ensure smooth video generation.

Steps:
1. **Caption**: Briefly describe the current state of the main object/hand in the Start Frame.
2. **Analyze**: Predict the end state of the instruction. Compare the caption with the Instruction. Identify the action that is expected to be completed in the image.
3. **Rewrite**: Convert the uncompleted action into a concise edit command (e.g., "add X", "move Y to Z", "change state of A").
4. **Constraint**: Explicitly state what should remain unchanged (background, lighting, objects).

### Example:
[Start Frame]: (A hand holding a watermelon next to a mesh bag on the ground.)
[Instruction]: holding watermelon, placing watermelon in mesh bag, adjusting bag.
[Analysis]: The image shows the "holding" phase. The "placing in bag" is the next step.
[Edit Command]: Place the watermelon inside the white mesh bag. The hand is now adjusting the bag opening. The soil and grass background remains unchanged.

### Now process this:
[Start Frame]: (The image provided above)
[Instruction]: {instruction}
[Edit Command]:"#;

const CAMERA_MOTION_TEMPLATE: &str = r#"Task: Generate {count} distinct spatial camera movement commands for [SC1: Camera Motion].
[Role]: Professional Cinematic Narrative Director.
[Goal]: Describe a SIGNIFICANT camera shift and its precise impact on the composition based on the provided image.

[STRICT RULES]:
1. COMPOSITION FEEDBACK: You MUST describe how the objects in the current image move within the frame and what new elements appear.
2. LANGUAGE: Output strictly in English.
3. FORMAT: Each MOD must follow this structure: "The camera has [action] significantly by [magnitude]. The [original object] originally at the [original position] has now moved towards the [opposite direction of camera action] to the [new position], revealing [new content] at the [action direction]. Lighting and terrain remain consistent."
4. SINGLE DIMENSION: Focus on ONE major movement per MOD (Yaw, Pitch, or Translation).
5. MAGNITUDE: Use specific degrees (e.g., 30°, 60°, 120°).
6. PERSPECTIVE REQUIREMENT: MOD_1 must adopt a bird’s-eye view, and its camera action must align with this perspective.

Output strictly in JSON format:
{
  "MOD_1": "...", "MOD_2": "...", "MOD_3": "...", "MOD_4": "...", "MOD_5": "...", "MOD_6": "..."
}"#;

const BACKGROUND_TRANSITION_TEMPLATE: &str = r#"Task: Write {count} background transition commands for [SC2].
[Role]: Realistic Environment Concept Artist.
[Goal]: Change ONLY the geographic setting/location. Keep the main subject and weather IDENTICAL to the original image.

[STRICT RULES]:
1. SUBJECT RETENTION: Identify the primary subject (person, vehicle, animal, or specific structure).
   - CRITICAL: If no clear central subject exists, you MUST treat the existing composition's perspective, horizon line, and overall layout as the "Subject". Preserve the structural skeleton of the image.
2. PURE SETTING: Replace only the terrain or environment type (e.g., from green hills to a rocky desert). Do not relocate or remove the main objects.
3. WEATHER CONSISTENCY: Do NOT change the weather, time of day, or lighting. If the original is sunny, the new setting must also be sunny.
4. REALISM ONLY: Use "Realistic Modern City", "Natural Landscape", etc. Strictly AVOID "Cyberpunk", "Futuristic", or "Sci-fi".
5. NO ATMOSPHERE: Do not use words like "rainy", "snowy", "stormy", or "misty". Focus on "Location" only.
6. FORMAT: Each MOD must follow this structure: "The main subject [main subject name/description] remains unchanged. The original [original setting] is replaced with a [new realistic setting], preserving the same weather, lighting, and composition layout. The terrain transitions seamlessly while keeping the subject’s position and proportions consistent."

Output strictly in JSON format:
{
  "MOD_1": "...", "MOD_2": "...", "MOD_3": "...", "MOD_4": "...", "MOD_5": "..."
}"#;

const DYNAMIC_ACTIVITY_TEMPLATE: &str = r#"Task: Generate {count} distinct dynamic activity commands for [SC-4].
Goal: Based on the provided starting frame, describe a 5-second realistic movement of the {object} that maintains high visual consistency with the original scene.

[STRICT RULES]:
1. IMAGE FIDELITY & PERSISTENCE: The motion must be a direct continuation of the starting frame. Identify the specific agents (people, animals, vehicles) already present in the image and explicitly describe their subsequent actions or trajectory (e.g., "the person standing by the tree starts walking towards the bench").
2. 5-SECOND REALISM: The motion must be achievable within 5 seconds. Describe agents moving a short distance (e.g., "walking a few steps forward", "a car passing through the intersection").
3. PERSPECTIVE: Since this is a walking/pedestrian view, describe agents relative to the camera (e.g., "coming towards the camera", "crossing from left to right").
4. OBJECT DESTINATION: Clearly state where the objects are going or how their state changes (e.g., "the dog runs out of the right frame", "the parked car starts to pull away").
5. NO BLUR/SHARPNESS: Keep agents crisp and sharp as if captured with high shutter speed.
6. CONTINUITY: The background, lighting, and static objects must remain identical to the original image.

{object}: various people | vehicles | people & vehicles | animals | boats | ships
{density}: sparse | moderate
{activity}: calm | normal | busy

Output strictly in JSON format:
{
  "MOD_1": "...", "MOD_2": "...", "MOD_3": "...", "MOD_4": "..."
}"#;

const LIGHTING_TEMPLATE: &str = r#"Task: Write {count} lighting/atmosphere commands. Change ONLY light/weather, keep geometry identical.
[Consistency]: DO NOT change the geometry or identity of any objects.
Output strictly in JSON format: { "MOD_1": "...", "MOD_2": "...", "MOD_3": "...", "MOD_4": "..." , "MOD_5": "...", "MOD_6": "..."}"#;

/// A family of multi-candidate prompt templates.
///
/// Each family asks the model for a fixed count of JSON-keyed variants and
/// owns the manifest field names derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptFamily {
    CameraMotion,
    BackgroundTransition,
    DynamicActivity,
    Lighting,
}

impl PromptFamily {
    pub const ALL: [Self; 4] = [
        Self::CameraMotion,
        Self::BackgroundTransition,
        Self::DynamicActivity,
        Self::Lighting,
    ];

    /// Key prefix applied to every variant parsed from a response, so a
    /// model key `MOD_1` lands on the record as e.g. `SC4_MOD_1`.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::CameraMotion => "SC1",
            Self::BackgroundTransition => "SC2",
            Self::DynamicActivity => "SC4",
            Self::Lighting => "SC5",
        }
    }

    /// Work-item target field, also the stem of the fallback fields.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::CameraMotion => "SC1_BATCH",
            Self::BackgroundTransition => "SC2_BATCH",
            Self::DynamicActivity => "SC4_BATCH",
            Self::Lighting => "SC5_BATCH",
        }
    }

    /// How many keyed variants the template requests from the model.
    #[must_use]
    pub fn variant_count(self) -> usize {
        match self {
            Self::CameraMotion | Self::Lighting => 6,
            Self::BackgroundTransition => 5,
            Self::DynamicActivity => 3,
        }
    }

    #[must_use]
    pub fn render(self) -> String {
        let count = self.variant_count().to_string();
        match self {
            Self::CameraMotion => CAMERA_MOTION_TEMPLATE.replace("{count}", &count),
            Self::BackgroundTransition => {
                BACKGROUND_TRANSITION_TEMPLATE.replace("{count}", &count)
            }
            Self::DynamicActivity => DYNAMIC_ACTIVITY_TEMPLATE
                .replace("{count}", &count)
                .replace("{object}", "contextual agents")
                .replace("{density}", "various")
                .replace("{activity}", "various"),
            Self::Lighting => LIGHTING_TEMPLATE.replace("{count}", &count),
        }
    }

    /// Families enabled for a multi-candidate mode by default.
    #[must_use]
    pub fn defaults_for(mode: Mode) -> Vec<Self> {
        match mode {
            Mode::Drone | Mode::Walk => vec![Self::DynamicActivity],
            Mode::Egovid => Vec::new(),
        }
    }
}

impl FromStr for PromptFamily {
    type Err = EditsetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sc1" | "camera_motion" => Ok(Self::CameraMotion),
            "sc2" | "background_transition" => Ok(Self::BackgroundTransition),
            "sc4" | "dynamic_activity" => Ok(Self::DynamicActivity),
            "sc5" | "lighting" => Ok(Self::Lighting),
            other => Err(EditsetError::UnknownFamily {
                value: other.to_string(),
            }),
        }
    }
}

/// Render the direct-caption template against a record's instruction text.
#[must_use]
pub fn render_direct_caption_prompt(instruction: &str) -> String {
    DIRECT_CAPTION_TEMPLATE.replace("{instruction}", instruction)
}
