//! CRT shader sources and their adaptation to the active GLSL dialect.
//!
//! The sources are written in GLSL ES 1.00 so they run unchanged on
//! WebGL-class contexts. Desktop core contexts reject `attribute`, `varying`
//! and `gl_FragColor`, so [`adapt_source`] prepends a `#version 330 core`
//! prelude that aliases them.

use serde::Deserialize;

use crate::backend::{GlslDialect, ShaderStage};

/// Name of the elapsed-seconds uniform.
pub const TIME_INPUT: &str = "time";
/// Name of the drawable-size uniform.
pub const RESOLUTION_INPUT: &str = "resolution";
/// Name of the clip-space vertex attribute.
pub const POSITION_INPUT: &str = "position";

pub const CRT_VERTEX_SHADER: &str = r"attribute vec2 position;
varying vec2 vUv;
void main() {
    vUv = position * 0.5 + 0.5;
    gl_Position = vec4(position, 0.0, 1.0);
}
";

/// Expects `CRT_INVERT_THRESHOLD`, `CRT_SWAP_THRESHOLD`, `CRT_GLITCH_THRESHOLD`
/// and `CRT_ALPHA` to be defined ahead of it; see [`ShaderSources::crt`].
pub const CRT_FRAGMENT_SHADER: &str = r"precision highp float;
uniform float time;
uniform vec2 resolution;
varying vec2 vUv;

float random(vec2 p) {
    return fract(sin(dot(p, vec2(12.9898, 78.233))) * 43758.5453123);
}

vec2 extremeDeform(vec2 uv, float time) {
    vec2 deformed = uv;

    vec2 center = vec2(0.5, 0.5);
    vec2 toCenter = uv - center;
    float dist = length(toCenter);
    float angle = atan(toCenter.y, toCenter.x);
    float twist = sin(time * 2.0) * 10.0;
    angle += dist * twist;
    float newDist = dist * (1.0 + sin(time * 3.0 + dist * 10.0) * 0.3);
    deformed = center + vec2(cos(angle), sin(angle)) * newDist;

    float wave1 = sin(uv.y * 20.0 + time * 4.0) * 0.1;
    float wave2 = sin(uv.y * 10.0 - time * 3.0) * 0.15;
    float wave3 = sin(uv.x * 30.0 + time * 5.0) * 0.08;
    float wave4 = sin((uv.x + uv.y) * 15.0 + time * 2.0) * 0.12;
    float wave5 = sin(dist * 30.0 - time * 6.0) * 0.1;

    deformed.x += wave1 + wave2 + wave3 + wave5;
    deformed.y += wave4 + wave5;

    float pinch = sin(time) * 0.5 + 0.5;
    deformed += normalize(toCenter) * sin(dist * 20.0 - time * 3.0) * 0.2 * pinch;

    float shockwave = sin(dist * 40.0 - time * 4.0) * 0.1;
    deformed += normalize(toCenter) * shockwave;

    return deformed;
}

vec3 extremeChromatic(vec2 uv, float time) {
    float maxOffset = 0.1;

    vec2 center = vec2(0.5, 0.5);
    vec2 toCenter = uv - center;
    float dist = length(toCenter);

    float aberrationStrength = maxOffset * (1.0 + sin(time * 2.0) * 0.3);
    aberrationStrength *= (1.0 + dist * 2.0);

    vec2 redOffset = vec2(
        cos(time * 1.1 + uv.y * 5.0) * aberrationStrength,
        sin(time * 0.8 + uv.x * 4.0) * aberrationStrength
    );
    vec2 greenOffset = vec2(
        cos(time * 0.9 + uv.y * 4.0) * aberrationStrength * 0.8,
        sin(time * 1.2 + uv.x * 5.0) * aberrationStrength * 0.8
    );
    vec2 blueOffset = vec2(
        cos(time * 1.3 + uv.y * 6.0) * aberrationStrength * 1.2,
        sin(time * 1.0 + uv.x * 3.0) * aberrationStrength * 1.2
    );

    vec2 redUV = uv + redOffset;
    vec2 greenUV = uv + greenOffset;
    vec2 blueUV = uv + blueOffset;

    float r = random(redUV) * (1.2 + sin(time * 3.0 + uv.y * 10.0) * 0.3);
    float g = random(greenUV) * (1.1 + sin(time * 2.7 + uv.x * 8.0) * 0.2);
    float b = random(blueUV) * (1.3 + sin(time * 3.3 + dist * 12.0) * 0.4);

    r += g * 0.1 + b * 0.05;
    g += r * 0.08 + b * 0.1;
    b += r * 0.05 + g * 0.08;

    return vec3(r, g, b);
}

float getScanlines(vec2 uv, float time) {
    float scanlines = 0.0;

    scanlines += sin(uv.y * 300.0 + time) * 0.15;
    scanlines += sin(uv.y * 600.0 - time * 2.0) * 0.08;
    scanlines += sin(uv.x * 200.0 + time * 3.0) * 0.05;

    float decay = fract(uv.y * 3.0 + time * 0.5);
    decay = pow(decay, 3.0) * 0.2;
    scanlines += decay;

    float noise = random(uv + time * 0.1) * 0.1;
    scanlines += noise;

    return scanlines;
}

float extremeInterference(vec2 uv, float time) {
    float interference = 0.0;

    for (float i = 1.0; i < 5.0; i++) {
        float speed = i * 2.0;
        float scale = i * 10.0;
        interference += sin(uv.y * scale + time * speed) * (0.3 / i);
        interference += cos(uv.x * scale - time * speed) * (0.3 / i);
    }

    float bandSpeed = 0.8;
    float bandWidth = 0.15;
    float bandCount = 4.0;

    for (float i = 0.0; i < 4.0; i++) {
        float offset = i / bandCount;
        float y = mod(uv.y + time * bandSpeed + offset, 1.0);
        float band = smoothstep(0.0, 0.02, y) * smoothstep(bandWidth, bandWidth - 0.02, y);
        interference = max(interference - band * 0.8, -0.8);
        if (band > 0.1) {
            interference += sin(time * 5.0 + uv.x * 10.0) * 0.1;
        }
    }

    float scanDistort = sin(uv.y * 100.0 + time * 10.0) * 0.1;
    interference += scanDistort * step(0.5, abs(interference));

    return interference;
}

void main() {
    // Equal to vUv on a full-viewport quad.
    vec2 uv = gl_FragCoord.xy / resolution;
    vec2 deformedUv = extremeDeform(uv, time);

    vec3 color = extremeChromatic(deformedUv, time);

    float interference = extremeInterference(deformedUv, time);
    color += vec3(interference) * vec3(0.6, 0.5, 0.7);
    color *= 1.0 + interference * 0.5;

    float scanlines = getScanlines(deformedUv, time);
    color *= 1.0 + scanlines;
    color.r *= 1.0 + scanlines * 0.2;
    color.g *= 1.0 + scanlines * 0.15;
    color.b *= 1.0 + scanlines * 0.25;

    float bleed = sin(deformedUv.y * 200.0 - time * 5.0) * 0.1;
    color.r += bleed * 0.1;
    color.b -= bleed * 0.08;

    float glow = sin(time * 2.0) * 0.1 + 0.9;
    color *= glow;

    float scanline = sin(deformedUv.y * 1000.0 + time * 5.0) * 0.5;
    color *= 1.0 + scanline;

    if (random(vec2(time * 0.5)) > CRT_INVERT_THRESHOLD) {
        color = 1.0 - color;
    }

    float colorShift = sin(time * 10.0);
    if (colorShift > 0.0) {
        color.r *= 2.0;
        color.g *= 0.5;
    } else {
        color.g *= 2.0;
        color.b *= 0.5;
    }

    if (random(floor(deformedUv * 10.0) + floor(time * 2.0)) > CRT_GLITCH_THRESHOLD) {
        vec2 blockUv = floor(deformedUv * 10.0) / 10.0;
        color = vec3(random(blockUv + time));
    }

    vec2 vignetteUv = deformedUv * 2.0 - 1.0;
    float vignette = 1.0 - dot(vignetteUv, vignetteUv) * (1.0 + sin(time * 3.0) * 0.5);
    color *= vignette;

    float pulse = sin(time * 8.0) * 0.2 + 0.8;
    color *= pulse * (1.0 + interference * 0.2);

    if (random(vec2(time)) > CRT_SWAP_THRESHOLD) {
        color = color.brg;
    }

    gl_FragColor = vec4(color, CRT_ALPHA);
}
";

/// Probability knobs of the CRT effect. Each threshold is compared against a
/// pseudo-random value in `[0, 1)`; higher means rarer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrtTuning {
    /// Whole-frame colour inversion.
    pub inversion_threshold: f32,
    /// Rotation of the RGB channels to BRG.
    pub channel_swap_threshold: f32,
    /// Per-cell digital glitch blocks on a 10x10 grid.
    pub glitch_threshold: f32,
    /// Output alpha of every fragment.
    pub alpha: f32,
}

impl Default for CrtTuning {
    fn default() -> Self {
        Self {
            inversion_threshold: 0.95,
            channel_swap_threshold: 0.97,
            glitch_threshold: 0.995,
            alpha: 0.95,
        }
    }
}

impl CrtTuning {
    fn fields(&self) -> [(&'static str, f32); 4] {
        [
            ("inversion_threshold", self.inversion_threshold),
            ("channel_swap_threshold", self.channel_swap_threshold),
            ("glitch_threshold", self.glitch_threshold),
            ("alpha", self.alpha),
        ]
    }

    /// First field outside `[0, 1]`, NaN included.
    pub fn out_of_range(&self) -> Option<(&'static str, f32)> {
        self.fields()
            .into_iter()
            .find(|(_, value)| !(0.0..=1.0).contains(value))
    }

    /// Every field inside `[0, 1]`; bad fields fall back to the default.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let pick = |name: &str, value: f32, fallback: f32| {
            if (0.0..=1.0).contains(&value) {
                value
            } else {
                tracing::warn!(field = name, value, fallback, "CRT tuning out of range");
                fallback
            }
        };
        Self {
            inversion_threshold: pick(
                "inversion_threshold",
                self.inversion_threshold,
                defaults.inversion_threshold,
            ),
            channel_swap_threshold: pick(
                "channel_swap_threshold",
                self.channel_swap_threshold,
                defaults.channel_swap_threshold,
            ),
            glitch_threshold: pick(
                "glitch_threshold",
                self.glitch_threshold,
                defaults.glitch_threshold,
            ),
            alpha: pick("alpha", self.alpha, defaults.alpha),
        }
    }

    fn defines(&self) -> String {
        let tuning = self.sanitized();
        // `{:?}` always prints a decimal point, which GLSL ES needs for floats.
        format!(
            "#define CRT_INVERT_THRESHOLD {:?}\n\
             #define CRT_SWAP_THRESHOLD {:?}\n\
             #define CRT_GLITCH_THRESHOLD {:?}\n\
             #define CRT_ALPHA {:?}\n",
            tuning.inversion_threshold,
            tuning.channel_swap_threshold,
            tuning.glitch_threshold,
            tuning.alpha
        )
    }
}

/// A vertex/fragment pair ready for [`crate::program::CompiledProgram::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// The CRT distortion pair with `tuning` baked into the fragment stage.
    /// Fields outside `[0, 1]` are replaced by their defaults.
    pub fn crt(tuning: &CrtTuning) -> Self {
        Self {
            vertex: CRT_VERTEX_SHADER.to_owned(),
            fragment: format!("{}{}", tuning.defines(), CRT_FRAGMENT_SHADER),
        }
    }

    pub fn source(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

const CORE_VERTEX_PRELUDE: &str = "#version 330 core
#define attribute in
#define varying out
";

const CORE_FRAGMENT_PRELUDE: &str = "#version 330 core
#define varying in
out vec4 crt_FragColor;
#define gl_FragColor crt_FragColor
";

/// Rewrites a GLSL ES 1.00 stage so `dialect` accepts it.
///
/// Any `#version` directive already present is dropped for core contexts and
/// replaced by the prelude; a `#line 1` keeps compiler logs pointing at the
/// caller's line numbers.
pub fn adapt_source(stage: ShaderStage, source: &str, dialect: GlslDialect) -> String {
    match dialect {
        GlslDialect::Es100 => source.to_owned(),
        GlslDialect::Core330 => {
            let body: Vec<&str> = source
                .lines()
                .filter(|line| !line.trim_start().starts_with("#version"))
                .collect();
            let prelude = match stage {
                ShaderStage::Vertex => CORE_VERTEX_PRELUDE,
                ShaderStage::Fragment => CORE_FRAGMENT_PRELUDE,
            };
            format!("{prelude}#line 1\n{}\n", body.join("\n"))
        }
    }
}
