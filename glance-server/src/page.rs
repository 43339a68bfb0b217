use crate::gallery::GalleryEntry;

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Image Caption Generator</title>
    <style>
        body {
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            max-width: 1000px;
            margin: auto;
            padding: 20px;
            color: #333;
        }
        h1 { color: #009688; text-align: center; margin-bottom: 0.5rem; }
        .subtitle { text-align: center; color: #607D8B; margin-bottom: 2rem; }
        .row { display: flex; gap: 24px; flex-wrap: wrap; }
        .column { flex: 1; min-width: 280px; }
        #preview { max-width: 100%; max-height: 300px; display: none; margin-top: 1rem; }
        button.generate {
            background: linear-gradient(90deg, #009688, #4DB6AC);
            color: white; border: none; border-radius: 6px;
            padding: 10px 18px; margin-top: 1rem; cursor: pointer;
        }
        #caption {
            width: 100%; min-height: 7rem; font-size: 1.2rem; padding: 1.2rem;
            border: none; border-left: 4px solid #009688; border-radius: 0.5rem;
            background: #f0f7fa; box-sizing: border-box;
        }
        .examples-header { text-align: center; color: #607D8B; margin-top: 2rem; }
        .examples { display: flex; gap: 12px; justify-content: center; }
        .examples button { border: none; padding: 0; cursor: pointer; background: none; }
        .examples img { width: 160px; height: 110px; object-fit: cover; border-radius: 6px; }
        footer {
            text-align: center; margin-top: 30px; padding: 20px;
            font-size: 0.9rem; color: #666; border-top: 1px solid #eee;
        }
    </style>
</head>
<body>
    <h1>Image Caption Generator</h1>
    <p class="subtitle">Describe your images with a BLIP captioning model</p>
    <div class="row">
        <div class="column">
            <form id="upload">
                <input type="file" id="image" name="image" accept="image/*">
                <img id="preview" alt="Selected image">
                <br>
                <button type="submit" class="generate">Generate Caption</button>
            </form>
        </div>
        <div class="column">
            <label for="caption">Generated Caption</label>
            <textarea id="caption" readonly placeholder="Your caption will appear here..."></textarea>
        </div>
    </div>
"#;

const TAIL: &str = r#"
    <footer>Powered by the BLIP image captioning model</footer>
    <script>
        const form = document.getElementById('upload');
        const input = document.getElementById('image');
        const preview = document.getElementById('preview');
        const caption = document.getElementById('caption');

        input.addEventListener('change', () => {
            const file = input.files[0];
            if (file) {
                preview.src = URL.createObjectURL(file);
                preview.style.display = 'block';
            }
        });

        async function show(response) {
            const body = await response.json();
            caption.value = response.ok ? body.caption : 'Error: ' + body.error;
        }

        form.addEventListener('submit', async (e) => {
            e.preventDefault();
            caption.value = 'Generating...';
            const data = new FormData();
            if (input.files[0]) {
                data.append('image', input.files[0]);
            }
            try {
                await show(await fetch('/caption', { method: 'POST', body: data }));
            } catch (err) {
                caption.value = 'Error: ' + err.message;
            }
        });

        document.querySelectorAll('.examples button').forEach((button) => {
            button.addEventListener('click', async () => {
                preview.src = button.querySelector('img').src;
                preview.style.display = 'block';
                caption.value = 'Generating...';
                try {
                    await show(await fetch('/examples/' + button.dataset.index, { method: 'POST' }));
                } catch (err) {
                    caption.value = 'Error: ' + err.message;
                }
            });
        });
    </script>
</body>
</html>
"#;

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Renders the captioning form, with the example gallery when one is given.
pub fn render(examples: Option<&[GalleryEntry]>) -> String {
    let mut html = String::from(HEAD);
    if let Some(examples) = examples.filter(|examples| !examples.is_empty()) {
        html.push_str("    <h3 class=\"examples-header\">Try with these examples:</h3>\n");
        html.push_str("    <div class=\"examples\">\n");
        for entry in examples {
            html.push_str(&format!(
                "        <button type=\"button\" data-index=\"{}\"><img src=\"{}\" alt=\"Example {}\"></button>\n",
                entry.index,
                escape_attr(&entry.url),
                entry.index + 1
            ));
        }
        html.push_str("    </div>\n");
    }
    html.push_str(TAIL);
    html
}
