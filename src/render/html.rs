use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::{check_sizes, feature_series, Series};
use crate::{CompoundTable, Layout, TreemapError};

const DATA_PLACEHOLDER: &str = "__TMAP_DATA__";

/// Everything the page needs, embedded as JSON.
#[derive(Serialize)]
struct Payload<'a> {
    x: &'a [f32],
    y: &'a [f32],
    s: &'a [u32],
    t: &'a [u32],
    ids: &'a [String],
    labels: &'a [String],
    series: Vec<Series>,
}

/// Write an interactive, self-contained HTML tree map.
///
/// # Arguments
///
/// * `layout` - Node coordinates and tree edges.
/// * `table` - The compounds; `smiles` labels the nodes and every other
///   column becomes a selectable series.
/// * `path` - Where to write the page.
pub fn draw_faerun(layout: &Layout, table: &CompoundTable, path: &Path) -> Result<(), TreemapError> {
    check_sizes(layout, table)?;
    let payload = Payload {
        x: &layout.x,
        y: &layout.y,
        s: &layout.s,
        t: &layout.t,
        ids: table.ids(),
        labels: table.smiles(),
        series: feature_series(table)?,
    };
    let page = render_page(&payload)?;
    std::fs::write(path, page).map_err(TreemapError::io(path))?;
    info!("wrote interactive tree map to {}", path.display());
    Ok(())
}

fn render_page(payload: &Payload) -> Result<String, TreemapError> {
    // The payload sits inside a <script> element and must not close it.
    let data = serde_json::to_string(payload)?.replace("</", "<\\/");
    Ok(PAGE_TEMPLATE.replace(DATA_PLACEHOLDER, &data))
}

const PAGE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>tmap</title>
<style>
  html, body { margin: 0; height: 100%; background: #ffffff; font-family: sans-serif; overflow: hidden; }
  #plot { position: absolute; top: 0; left: 0; width: 100%; height: 100%; cursor: grab; }
  #controls { position: absolute; top: 12px; left: 12px; z-index: 2; background: rgba(255,255,255,0.85); padding: 6px 10px; border-radius: 4px; }
  #legend { position: absolute; bottom: 12px; right: 12px; z-index: 2; background: rgba(255,255,255,0.85); padding: 6px 10px; border-radius: 4px; font-size: 12px; max-height: 40%; overflow-y: auto; }
  #legend .swatch { display: inline-block; width: 10px; height: 10px; margin-right: 6px; border-radius: 50%; }
  #tooltip { position: absolute; z-index: 3; pointer-events: none; background: #222; color: #fff; padding: 4px 8px; border-radius: 3px; font-size: 12px; display: none; }
</style>
</head>
<body>
<div id="controls"><label>Feature <select id="series"></select></label></div>
<canvas id="plot"></canvas>
<div id="legend"></div>
<div id="tooltip"></div>
<script type="application/json" id="tmap-data">__TMAP_DATA__</script>
<script>
(function () {
  "use strict";
  const data = JSON.parse(document.getElementById("tmap-data").textContent);
  const canvas = document.getElementById("plot");
  const ctx = canvas.getContext("2d");
  const select = document.getElementById("series");
  const legend = document.getElementById("legend");
  const tooltip = document.getElementById("tooltip");
  const view = { scale: 1, dx: 0, dy: 0 };
  let current = 0;
  let drag = null;

  data.series.forEach(function (series, i) {
    const option = document.createElement("option");
    option.value = String(i);
    option.textContent = series.title;
    select.appendChild(option);
  });

  function project(i) {
    const size = Math.min(canvas.width, canvas.height) * 0.9 * view.scale;
    return [canvas.width / 2 + data.x[i] * size + view.dx, canvas.height / 2 - data.y[i] * size + view.dy];
  }

  function draw() {
    canvas.width = window.innerWidth;
    canvas.height = window.innerHeight;
    ctx.clearRect(0, 0, canvas.width, canvas.height);
    ctx.strokeStyle = "#bbbbbb";
    ctx.lineWidth = 1;
    ctx.beginPath();
    for (let e = 0; e < data.s.length; e++) {
      const a = project(data.s[e]);
      const b = project(data.t[e]);
      ctx.moveTo(a[0], a[1]);
      ctx.lineTo(b[0], b[1]);
    }
    ctx.stroke();
    const colors = data.series[current].colors;
    for (let i = 0; i < data.x.length; i++) {
      const p = project(i);
      ctx.fillStyle = colors[i];
      ctx.beginPath();
      ctx.arc(p[0], p[1], 4, 0, 2 * Math.PI);
      ctx.fill();
    }
    drawLegend();
  }

  function drawLegend() {
    const series = data.series[current];
    legend.replaceChildren();
    const title = document.createElement("div");
    title.textContent = series.legend_title;
    title.style.fontWeight = "bold";
    legend.appendChild(title);
    series.legend.forEach(function (entry) {
      const row = document.createElement("div");
      const swatch = document.createElement("span");
      swatch.className = "swatch";
      swatch.style.background = entry.color;
      row.appendChild(swatch);
      row.appendChild(document.createTextNode(entry.label));
      legend.appendChild(row);
    });
  }

  function nearest(mx, my) {
    let best = -1;
    let bestDistance = 36;
    for (let i = 0; i < data.x.length; i++) {
      const p = project(i);
      const d = (p[0] - mx) * (p[0] - mx) + (p[1] - my) * (p[1] - my);
      if (d < bestDistance) {
        bestDistance = d;
        best = i;
      }
    }
    return best;
  }

  canvas.addEventListener("mousedown", function (event) {
    drag = [event.clientX, event.clientY];
  });
  window.addEventListener("mouseup", function () {
    drag = null;
  });
  canvas.addEventListener("mousemove", function (event) {
    if (drag) {
      view.dx += event.clientX - drag[0];
      view.dy += event.clientY - drag[1];
      drag = [event.clientX, event.clientY];
      draw();
      return;
    }
    const i = nearest(event.clientX, event.clientY);
    if (i < 0) {
      tooltip.style.display = "none";
      return;
    }
    tooltip.textContent = data.ids[i] + ": " + data.labels[i];
    tooltip.style.left = event.clientX + 12 + "px";
    tooltip.style.top = event.clientY + 12 + "px";
    tooltip.style.display = "block";
  });
  canvas.addEventListener("wheel", function (event) {
    event.preventDefault();
    const factor = event.deltaY < 0 ? 1.1 : 1 / 1.1;
    view.scale *= factor;
    view.dx *= factor;
    view.dy *= factor;
    draw();
  }, { passive: false });
  select.addEventListener("change", function () {
    current = Number(select.value);
    draw();
  });
  window.addEventListener("resize", draw);
  draw();
})();
</script>
</body>
</html>
"##;
